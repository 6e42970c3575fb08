//! WebSocket ⇄ TCP session.
//!
//! One session per browser connection: complete the WebSocket handshake,
//! dial the VNC server, then pump bytes both ways until either side closes
//! or the proxy is stopped. RFB bytes are forwarded untouched.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use super::http::RequestHead;
use super::{ProxyConfig, wait_for_stop};
use crate::error::{Result, WebdeskError};

/// Read size for data coming from the VNC server.
const BUFFER_SIZE: usize = 64 * 1024;

/// How payloads travel inside WebSocket frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw bytes in binary frames.
    Binary,
    /// Base64 text frames (old websockify clients).
    Base64,
}

impl Encoding {
    /// Pick the encoding and the subprotocol to echo back from what the
    /// client offered. `binary` wins; `base64` only if it is all that is
    /// offered.
    pub fn negotiate(offered: &[&str]) -> (Self, Option<&'static str>) {
        let has = |p: &str| offered.iter().any(|o| o.eq_ignore_ascii_case(p));
        if has("binary") {
            (Encoding::Binary, Some("binary"))
        } else if has("base64") {
            (Encoding::Base64, Some("base64"))
        } else {
            (Encoding::Binary, None)
        }
    }

    fn encode(self, data: &[u8]) -> Message {
        match self {
            Encoding::Binary => Message::Binary(data.to_vec()),
            Encoding::Base64 => Message::Text(BASE64.encode(data)),
        }
    }
}

/// Byte counters for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub to_target: u64,
    pub from_target: u64,
}

/// Handle an upgrade request end to end.
pub(crate) async fn proxy_websocket(
    stream: TcpStream,
    head: &RequestHead,
    config: &ProxyConfig,
    running: &Arc<AtomicBool>,
) -> Result<SessionStats> {
    let (encoding, protocol) = Encoding::negotiate(&head.subprotocols());

    let callback = move |_req: &Request, mut response: Response| -> std::result::Result<Response, ErrorResponse> {
        if let Some(p) = protocol {
            response
                .headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(p));
        }
        Ok(response)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;

    let target_addr = config.target_addr();
    let target = match TcpStream::connect(&target_addr).await {
        Ok(t) => t,
        Err(e) => {
            warn!("failed to connect to target {target_addr}: {e}");
            let frame = CloseFrame {
                code: CloseCode::Error,
                reason: "target unavailable".into(),
            };
            let _ = ws.close(Some(frame)).await;
            return Err(e.into());
        }
    };
    target.set_nodelay(true)?;
    debug!("bridging to {target_addr} ({encoding:?})");

    run_session(ws, target, encoding, config.heartbeat, running).await
}

/// Pump frames and bytes until one side ends.
pub async fn run_session(
    ws: WebSocketStream<TcpStream>,
    target: TcpStream,
    encoding: Encoding,
    heartbeat: Option<Duration>,
    running: &Arc<AtomicBool>,
) -> Result<SessionStats> {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (mut target_rx, mut target_tx) = target.into_split();
    let mut heartbeat = heartbeat
        .filter(|p| !p.is_zero())
        .map(|p| tokio::time::interval_at(Instant::now() + p, p));
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut stats = SessionStats::default();

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    target_tx.write_all(&data).await?;
                    stats.to_target += data.len() as u64;
                }
                Some(Ok(Message::Text(text))) => match encoding {
                    Encoding::Base64 => {
                        let data = BASE64
                            .decode(text.trim())
                            .map_err(|e| WebdeskError::Other(format!("bad base64 frame: {e}")))?;
                        target_tx.write_all(&data).await?;
                        stats.to_target += data.len() as u64;
                    }
                    Encoding::Binary => debug!("ignoring text frame in binary session"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                // Pings are answered by tungstenite; pongs need nothing.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            read = target_rx.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                ws_tx.send(encoding.encode(&buf[..n])).await?;
                stats.from_target += n as u64;
            }
            _ = tick(&mut heartbeat) => {
                ws_tx.send(Message::Ping(Vec::new())).await?;
            }
            _ = wait_for_stop(running) => {
                let frame = CloseFrame {
                    code: CloseCode::Away,
                    reason: "proxy shutting down".into(),
                };
                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }

    let _ = target_tx.shutdown().await;
    Ok(stats)
}

/// Resolves on the next heartbeat tick; never if heartbeats are off.
async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_preferred() {
        assert_eq!(
            Encoding::negotiate(&["base64", "binary"]),
            (Encoding::Binary, Some("binary"))
        );
    }

    #[test]
    fn base64_only_when_alone() {
        assert_eq!(
            Encoding::negotiate(&["base64"]),
            (Encoding::Base64, Some("base64"))
        );
    }

    #[test]
    fn no_subprotocol_means_plain_binary() {
        assert_eq!(Encoding::negotiate(&[]), (Encoding::Binary, None));
        assert_eq!(Encoding::negotiate(&["chat"]), (Encoding::Binary, None));
    }

    #[test]
    fn base64_frames_are_text() {
        match Encoding::Base64.encode(b"RFB 003.008\n") {
            Message::Text(t) => assert_eq!(t, "UkZCIDAwMy4wMDgK"),
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(matches!(Encoding::Binary.encode(b"x"), Message::Binary(_)));
    }
}
