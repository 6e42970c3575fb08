//! The launch sequence.
//!
//! Linear: check dependencies, confirm manual setup, fetch the web client,
//! start the VNC server, bind the proxy, optionally open a tunnel, print
//! the URLs, open a browser, serve until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use webdesk_core::deps::{PathProbe, SystemProbe};
use webdesk_core::error::{Result, WebdeskError};
use webdesk_core::process::{SpawnedProcess, Spawner, SystemSpawner};
use webdesk_core::{
    AssetProvisioner, Platform, PublicTunnel, TunnelManager, VncServerHandle, VncServerLauncher,
    WebSocketProxy, browser, net, setup,
};

use crate::config::LauncherConfig;

/// Drives one session from dependency check to shutdown.
pub struct Launcher {
    config: LauncherConfig,
    platform: Platform,
    spawner: Arc<dyn Spawner>,
    probe: Box<dyn PathProbe + Send + Sync>,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            platform: Platform::current(),
            spawner: Arc::new(SystemSpawner),
            probe: Box::new(SystemProbe),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn PathProbe + Send + Sync>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Run every step; returns after the proxy has been stopped.
    pub async fn run(&self) -> Result<()> {
        println!("Starting remote desktop access server...");

        // Validate before anything is started.
        let vnc_config = self.config.to_vnc_config()?;
        let vnc_port = vnc_config.port(self.platform);

        self.check_dependencies()?;
        self.confirm_setup(vnc_port).await?;
        let web_root = self.provision_assets().await?;

        let vnc = VncServerLauncher::new(vnc_config, self.platform, self.spawner.as_ref())
            .launch()
            .await?;

        // The proxy binds only once the VNC server has been started.
        let proxy = WebSocketProxy::new(self.config.to_proxy_config(vnc.port, Some(web_root)));
        println!("Starting noVNC on port {}...", proxy.config().listen_port);
        let listener = TcpListener::bind(proxy.config().listen_addr()).await?;
        let listen_port = listener.local_addr()?.port();

        let tunnel = self.start_tunnel(listen_port).await;

        let ip = net::local_ipv4().await;
        let local_url = net::access_url(ip, listen_port, &self.config.assets.landing_page);
        self.print_summary(&local_url, tunnel.as_ref(), vnc.port);

        if self.config.browser.open {
            tokio::time::sleep(Duration::from_millis(self.config.browser.delay_ms)).await;
            browser::open_browser(self.platform, &local_url, self.spawner.as_ref());
        }

        println!();
        println!("Press Ctrl+C to stop the server");

        let stop = proxy.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!();
                println!();
                println!("Shutting down...");
                info!("Ctrl-C received, stopping proxy");
                stop.store(false, Ordering::SeqCst);
            }
        });

        proxy.serve(listener).await?;
        println!("Server stopped");
        self.report_children(&vnc, tunnel.as_ref());
        Ok(())
    }

    /// Fail with the first missing requirement.
    pub fn check_dependencies(&self) -> Result<()> {
        self.config
            .dependency_checker(self.platform)
            .check(self.probe.as_ref())
    }

    async fn confirm_setup(&self, vnc_port: u16) -> Result<()> {
        let platform = self.platform;
        let shown = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            setup::confirm_manual_setup(platform, vnc_port, &mut stdin.lock(), &mut stdout.lock())
        })
        .await
        .map_err(|e| WebdeskError::Other(format!("setup prompt failed: {e}")))??;
        if shown {
            info!("manual VNC server setup confirmed");
        }
        Ok(())
    }

    /// Fetch the web client if needed and return its absolute path.
    pub async fn provision_assets(&self) -> Result<PathBuf> {
        let assets = &self.config.assets;
        let provisioner = AssetProvisioner::new(&assets.dir, &assets.repository, self.platform)
            .with_landing_page(&assets.landing_page);
        let outcome = provisioner.provision(self.spawner.as_ref()).await?;
        info!(
            "web client ready (fetched: {}, index created: {})",
            outcome.fetched, outcome.index_created
        );
        Ok(tokio::fs::canonicalize(provisioner.dir()).await?)
    }

    async fn start_tunnel(&self, port: u16) -> Option<PublicTunnel> {
        if !self.config.tunnel.enabled {
            return None;
        }
        TunnelManager::new(self.config.to_tunnel_config())
            .establish(port, self.spawner.as_ref())
            .await
    }

    fn print_summary(&self, local_url: &str, tunnel: Option<&PublicTunnel>, vnc_port: u16) {
        println!();
        println!("Setup Complete!");
        println!();
        println!("Local access URL: {local_url}");
        if let Some(t) = tunnel {
            println!("Public access URL: {}", t.public_url);
        }
        info!("local access URL: {local_url}");

        if self.platform.is_windows() {
            if let Err(e) = setup::print_reminders(vnc_port, &mut std::io::stdout()) {
                warn!("could not print reminders: {e}");
            }
        }
    }

    /// The VNC server and tunnel outlive the launcher; say so.
    fn report_children(&self, vnc: &VncServerHandle, tunnel: Option<&PublicTunnel>) {
        let children: Vec<&SpawnedProcess> = vnc
            .process
            .iter()
            .chain(tunnel.and_then(|t| t.process.as_ref()))
            .collect();
        for child in children {
            info!("left running: `{}` (pid {:?})", child.command, child.pid);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
