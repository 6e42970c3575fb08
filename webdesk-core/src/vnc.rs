//! VNC server launch.
//!
//! Fire-and-forget: the server is started (or its Windows service asked to
//! start) and given a fixed settle delay. There is no readiness probe.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::deps::{TIGHTVNC_DIR, TIGHTVNC_URL};
use crate::error::{Result, WebdeskError};
use crate::platform::Platform;
use crate::process::{CommandSpec, SpawnedProcess, Spawner};

/// First VNC port; display `:N` listens on `5900 + N`.
pub const VNC_BASE_PORT: u16 = 5900;

// ── Geometry ─────────────────────────────────────────────────────

/// Screen size in pixels, written `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl FromStr for Geometry {
    type Err = WebdeskError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WebdeskError::InvalidGeometry(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let dimension = |part: &str| -> Result<u32> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let width = dimension(w)?;
        let height = dimension(h)?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Launcher ─────────────────────────────────────────────────────

/// VNC server settings.
#[derive(Debug, Clone)]
pub struct VncServerConfig {
    pub geometry: Geometry,
    /// Colour depth in bits.
    pub depth: u8,
    /// X display number (Unix).
    pub display: u16,
    /// Service name for `net start` (Windows).
    pub windows_service: String,
    /// TightVNC install directory (Windows).
    pub windows_install_dir: PathBuf,
    pub settle_delay: Duration,
}

impl Default for VncServerConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            depth: 24,
            display: 1,
            windows_service: "tvnserver".into(),
            windows_install_dir: PathBuf::from(TIGHTVNC_DIR),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl VncServerConfig {
    /// TCP port the server will listen on.
    pub fn port(&self, platform: Platform) -> u16 {
        match platform {
            Platform::Windows => VNC_BASE_PORT,
            Platform::Unix => VNC_BASE_PORT.saturating_add(self.display),
        }
    }
}

/// A started (or already running) VNC server.
#[derive(Debug, Clone)]
pub struct VncServerHandle {
    pub port: u16,
    /// `None` when the server runs as an OS service.
    pub process: Option<SpawnedProcess>,
}

/// Starts the VNC server for one platform.
pub struct VncServerLauncher<'a> {
    config: VncServerConfig,
    platform: Platform,
    spawner: &'a dyn Spawner,
}

impl<'a> VncServerLauncher<'a> {
    pub fn new(config: VncServerConfig, platform: Platform, spawner: &'a dyn Spawner) -> Self {
        Self {
            config,
            platform,
            spawner,
        }
    }

    /// The command that starts the server.
    pub fn command(&self) -> CommandSpec {
        match self.platform {
            Platform::Windows => CommandSpec::new("net")
                .arg("start")
                .arg(&self.config.windows_service),
            Platform::Unix => CommandSpec::new("vncserver")
                .arg(format!(":{}", self.config.display))
                .arg("-geometry")
                .arg(self.config.geometry.to_string())
                .arg("-depth")
                .arg(self.config.depth.to_string())
                .arg("-localhost")
                .arg("no"),
        }
    }

    pub async fn launch(&self) -> Result<VncServerHandle> {
        let port = self.config.port(self.platform);
        match self.platform {
            Platform::Windows => {
                let exe = self.config.windows_install_dir.join("tvnserver.exe");
                if !tokio::fs::try_exists(&exe).await.unwrap_or(false) {
                    return Err(WebdeskError::MissingDependency {
                        name: "TightVNC".into(),
                        hint: TIGHTVNC_URL.into(),
                    });
                }
                // Non-zero when the service is already running.
                let start = self.command();
                if let Err(e) = self.spawner.run(&start).await?.check(&start) {
                    warn!("{e}; assuming the service is already running");
                }
                println!("TightVNC service is running");
                Ok(VncServerHandle {
                    port,
                    process: None,
                })
            }
            Platform::Unix => {
                let process = self.spawner.spawn(&self.command())?;
                info!(
                    "vncserver :{} started (pid {:?}), geometry {}",
                    self.config.display, process.pid, self.config.geometry
                );
                tokio::time::sleep(self.config.settle_delay).await;
                Ok(VncServerHandle {
                    port,
                    process: Some(process),
                })
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingSpawner;

    #[test]
    fn geometry_parses_and_displays() {
        let g: Geometry = "1920x1080".parse().unwrap();
        assert_eq!(g, Geometry { width: 1920, height: 1080 });
        assert_eq!(g.to_string(), "1920x1080");
        assert_eq!(" 800X600 ".parse::<Geometry>().unwrap().width, 800);
    }

    #[test]
    fn geometry_rejects_garbage() {
        for bad in [
            "", "1280", "1280x", "x800", "0x800", "1280x-1", "wide x tall", "+1280x+800", "1280x 800",
        ] {
            assert!(
                matches!(bad.parse::<Geometry>(), Err(WebdeskError::InvalidGeometry(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn port_follows_display_on_unix() {
        let mut cfg = VncServerConfig::default();
        assert_eq!(cfg.port(Platform::Windows), 5900);
        assert_eq!(cfg.port(Platform::Unix), 5901);
        cfg.display = 0;
        assert_eq!(cfg.port(Platform::Unix), 5900);
    }

    #[tokio::test]
    async fn unix_spawns_vncserver() {
        let spawner = RecordingSpawner::default();
        let cfg = VncServerConfig {
            geometry: "1024x768".parse().unwrap(),
            settle_delay: Duration::ZERO,
            ..VncServerConfig::default()
        };
        let handle = VncServerLauncher::new(cfg, Platform::Unix, &spawner)
            .launch()
            .await
            .unwrap();

        assert_eq!(handle.port, 5901);
        assert!(handle.process.is_some());
        let spawned = spawner.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(
            spawned[0].to_string(),
            "vncserver :1 -geometry 1024x768 -depth 24 -localhost no"
        );
    }

    #[tokio::test]
    async fn windows_requires_server_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let cfg = VncServerConfig {
            windows_install_dir: tmp.path().to_path_buf(),
            ..VncServerConfig::default()
        };
        let launcher = VncServerLauncher::new(cfg, Platform::Windows, &spawner);
        let err = launcher.launch().await.unwrap_err();
        assert!(matches!(err, WebdeskError::MissingDependency { .. }));
        assert!(spawner.ran().is_empty());
    }

    #[tokio::test]
    async fn windows_tolerates_already_running_service() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tvnserver.exe"), b"").unwrap();
        let spawner = RecordingSpawner::exiting_with(2);
        let cfg = VncServerConfig {
            windows_install_dir: tmp.path().to_path_buf(),
            ..VncServerConfig::default()
        };
        let handle = VncServerLauncher::new(cfg, Platform::Windows, &spawner)
            .launch()
            .await
            .unwrap();
        assert_eq!(handle.port, 5900);
        assert!(handle.process.is_none());
        assert_eq!(spawner.ran()[0].to_string(), "net start tvnserver");
    }
}
