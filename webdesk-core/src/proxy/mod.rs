//! WebSocket-to-TCP proxy.
//!
//! Lets the browser-based noVNC client reach a plain TCP VNC server. The
//! listen port speaks both HTTP (static noVNC assets) and WebSocket
//! (bridged to the VNC port); see [`http`] and [`bridge`].

pub mod bridge;
pub mod http;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::Result;
use self::http::Peeked;

/// Everything the proxy needs to know, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Host of the VNC server.
    pub target_host: String,
    pub target_port: u16,
    /// Interface to bind; empty means all interfaces.
    pub listen_host: String,
    pub listen_port: u16,
    /// Directory served over plain HTTP.
    pub web_root: Option<PathBuf>,
    /// WebSocket ping period; `None` disables heartbeats.
    pub heartbeat: Option<Duration>,
    /// Log every connection at info level.
    pub verbose: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".into(),
            target_port: 5900,
            listen_host: String::new(),
            listen_port: 6080,
            web_root: None,
            heartbeat: Some(Duration::from_secs(30)),
            verbose: false,
        }
    }
}

impl ProxyConfig {
    pub fn listen_addr(&self) -> String {
        let host = if self.listen_host.is_empty() {
            "0.0.0.0"
        } else {
            self.listen_host.as_str()
        };
        format!("{host}:{}", self.listen_port)
    }

    pub fn target_addr(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}

// ── WebSocketProxy ───────────────────────────────────────────────

/// The proxy server.
///
/// Armed on construction; [`stop`](Self::stop) (or storing `false` through
/// [`stop_handle`](Self::stop_handle)) makes `start`/`serve` return and
/// closes every open session.
pub struct WebSocketProxy {
    config: Arc<ProxyConfig>,
    running: Arc<AtomicBool>,
}

impl WebSocketProxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Shared flag; storing `false` stops the proxy.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the configured listen address and serve until stopped.
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until stopped.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(
            "proxying from {local} to {}",
            self.config.target_addr()
        );
        if let Some(web) = &self.config.web_root {
            info!("serving web files from {}", web.display());
        }

        while self.is_running() {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            let config = Arc::clone(&self.config);
            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, &config, &running).await {
                    warn!("{peer}: {e}");
                }
            });
        }

        info!("proxy on {local} stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &ProxyConfig,
    running: &Arc<AtomicBool>,
) -> Result<()> {
    let head = match http::peek_head(&stream).await? {
        Peeked::Head(head) => head,
        Peeked::Closed => return Ok(()),
        Peeked::Invalid => return http::respond_status(stream, 400).await,
    };

    if head.is_websocket_upgrade() {
        if config.verbose {
            info!("{peer}: websocket connection on {}", head.target);
        } else {
            debug!("{peer}: websocket connection on {}", head.target);
        }
        let stats = bridge::proxy_websocket(stream, &head, config, running).await?;
        info!(
            "{peer}: session closed ({} bytes to target, {} from target)",
            stats.to_target, stats.from_target
        );
    } else {
        let status = http::serve_static(stream, &head, config.web_root.as_deref()).await?;
        if config.verbose {
            info!("{peer}: {} {} {status}", head.method, head.target);
        }
    }
    Ok(())
}

/// Resolves when `running` becomes false.
pub(crate) async fn wait_for_stop(running: &Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
