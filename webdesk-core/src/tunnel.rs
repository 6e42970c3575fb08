//! Public tunnel via ngrok.
//!
//! Best effort throughout: any failure is logged and the launcher goes on
//! with local access only.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, WebdeskError};
use crate::process::{CommandSpec, SpawnedProcess, Spawner};

pub const NGROK_DOWNLOAD_URL: &str = "https://ngrok.com/download";

// ── Control-plane payload ────────────────────────────────────────

/// `GET /api/tunnels` response body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TunnelList {
    #[serde(default)]
    pub tunnels: Vec<TunnelDescriptor>,
}

/// One tunnel as reported by the control plane.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TunnelDescriptor {
    #[serde(default)]
    pub name: String,
    pub public_url: String,
    #[serde(default)]
    pub proto: String,
}

// ── Configuration ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Tunnel executable.
    pub program: String,
    /// Tunnel type passed as first argument (`tcp`, `http`).
    pub protocol: String,
    /// Base URL of the local control plane.
    pub control_url: String,
    /// Wait between spawning and querying.
    pub startup_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            program: "ngrok".into(),
            protocol: "tcp".into(),
            control_url: "http://localhost:4040".into(),
            startup_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A tunnel that is up, with its public address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicTunnel {
    pub public_url: String,
    /// `None` when the tunnel program was already running.
    pub process: Option<SpawnedProcess>,
}

// ── TunnelManager ────────────────────────────────────────────────

pub struct TunnelManager {
    config: TunnelConfig,
    client: reqwest::Client,
}

impl TunnelManager {
    pub fn new(config: TunnelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn tunnels_url(&self) -> String {
        format!("{}/api/tunnels", self.config.control_url.trim_end_matches('/'))
    }

    /// The command that starts a tunnel to `port`.
    pub fn command(&self, port: u16) -> CommandSpec {
        CommandSpec::new(&self.config.program)
            .arg(&self.config.protocol)
            .arg(port.to_string())
            .args(["--log", "stdout"])
            .quiet()
    }

    /// Whether the control plane answers at all.
    pub async fn probe(&self) -> bool {
        let url = self.tunnels_url();
        match self.client.get(&url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("control plane not reachable at {url}: {e}");
                false
            }
        }
    }

    /// Current tunnels from the control plane.
    pub async fn tunnels(&self) -> Result<TunnelList> {
        let list = self
            .client
            .get(self.tunnels_url())
            .send()
            .await?
            .error_for_status()?
            .json::<TunnelList>()
            .await?;
        Ok(list)
    }

    /// Public URL of the first tunnel.
    pub async fn public_url(&self) -> Result<String> {
        self.tunnels()
            .await?
            .tunnels
            .into_iter()
            .next()
            .map(|t| t.public_url)
            .ok_or_else(|| WebdeskError::Tunnel("control plane lists no tunnels".into()))
    }

    /// Make sure a tunnel to `port` exists and return its public address.
    ///
    /// Never fails: problems are logged and yield `None`.
    pub async fn establish(&self, port: u16, spawner: &dyn Spawner) -> Option<PublicTunnel> {
        let process = if self.probe().await {
            println!("Ngrok is already running");
            None
        } else {
            match spawner.spawn(&self.command(port)) {
                Ok(p) => {
                    info!("started {} (pid {:?})", p.command, p.pid);
                    tokio::time::sleep(self.config.startup_delay).await;
                    Some(p)
                }
                Err(e) => {
                    warn!("{e}");
                    print_install_hint();
                    return None;
                }
            }
        };

        match self.public_url().await {
            Ok(public_url) => {
                println!();
                println!("Ngrok tunnel established: {public_url}");
                Some(PublicTunnel {
                    public_url,
                    process,
                })
            }
            Err(e) => {
                warn!("could not get ngrok URL: {e}");
                print_install_hint();
                None
            }
        }
    }
}

fn print_install_hint() {
    println!("Please install ngrok from {NGROK_DOWNLOAD_URL}");
    println!("And run: ngrok authtoken YOUR_AUTH_TOKEN");
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingSpawner;

    const PAYLOAD: &str = r#"{
        "tunnels": [
            {
                "name": "command_line",
                "uri": "/api/tunnels/command_line",
                "public_url": "tcp://0.tcp.ngrok.io:12345",
                "proto": "tcp",
                "config": {"addr": "localhost:6080", "inspect": false}
            }
        ],
        "uri": "/api/tunnels"
    }"#;

    #[test]
    fn parses_control_plane_payload() {
        let list: TunnelList = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(list.tunnels.len(), 1);
        assert_eq!(list.tunnels[0].public_url, "tcp://0.tcp.ngrok.io:12345");
        assert_eq!(list.tunnels[0].proto, "tcp");
    }

    #[test]
    fn empty_payload_has_no_tunnels() {
        let list: TunnelList = serde_json::from_str("{}").unwrap();
        assert!(list.tunnels.is_empty());
    }

    #[test]
    fn command_targets_proxy_port() {
        let mgr = TunnelManager::new(TunnelConfig::default());
        assert_eq!(mgr.command(6080).to_string(), "ngrok tcp 6080 --log stdout");
    }

    #[test]
    fn tunnels_url_tolerates_trailing_slash() {
        let mgr = TunnelManager::new(TunnelConfig {
            control_url: "http://127.0.0.1:4040/".into(),
            ..TunnelConfig::default()
        });
        assert_eq!(mgr.tunnels_url(), "http://127.0.0.1:4040/api/tunnels");
    }

    #[tokio::test]
    async fn unreachable_control_plane_spawns_and_gives_up() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let mgr = TunnelManager::new(TunnelConfig {
            control_url: format!("http://127.0.0.1:{port}"),
            startup_delay: Duration::ZERO,
            request_timeout: Duration::from_millis(500),
            ..TunnelConfig::default()
        });
        let spawner = RecordingSpawner::default();

        assert!(mgr.establish(6080, &spawner).await.is_none());
        assert_eq!(spawner.spawned().len(), 1);
    }

    #[tokio::test]
    async fn missing_tunnel_program_is_not_fatal() {
        let mgr = TunnelManager::new(TunnelConfig {
            control_url: "http://127.0.0.1:9".into(),
            startup_delay: Duration::ZERO,
            request_timeout: Duration::from_millis(500),
            ..TunnelConfig::default()
        });
        assert!(mgr.establish(6080, &RecordingSpawner::failing()).await.is_none());
    }
}
