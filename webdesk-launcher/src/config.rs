//! Configuration for the launcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use webdesk_core::deps::{DependencyChecker, Requirement};
use webdesk_core::error::Result;
use webdesk_core::{Geometry, Platform, ProxyConfig, TunnelConfig, VncServerConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Proxy listen / VNC target addresses.
    pub network: NetworkConfig,
    /// VNC server settings.
    pub vnc: VncConfig,
    /// noVNC client location.
    pub assets: AssetsConfig,
    /// WebSocket proxy behaviour.
    pub proxy: ProxySettings,
    /// Public tunnel.
    pub tunnel: TunnelSettings,
    /// Browser launch.
    pub browser: BrowserConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Extra software that must be installed.
    pub dependencies: DependenciesConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface the proxy binds; empty for all interfaces.
    pub listen_host: String,
    /// Port the proxy listens on.
    pub listen_port: u16,
    /// Host the VNC server is reached on.
    pub target_host: String,
}

/// VNC server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VncConfig {
    /// Screen geometry, `WIDTHxHEIGHT`.
    pub geometry: String,
    /// Colour depth in bits.
    pub depth: u8,
    /// X display number; the server listens on 5900 + display.
    pub display: u16,
    /// Windows service started with `net start`.
    pub windows_service: String,
    /// TightVNC install directory on Windows.
    pub windows_install_dir: String,
    /// Wait after starting the server, in milliseconds.
    pub settle_delay_ms: u64,
}

/// Web client location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Local directory holding noVNC.
    pub dir: String,
    /// Git repository cloned when `dir` is missing.
    pub repository: String,
    /// Page opened in the browser.
    pub landing_page: String,
}

/// WebSocket proxy behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Ping interval in seconds; 0 disables.
    pub heartbeat_secs: u64,
    /// Log every connection.
    pub verbose: bool,
}

/// Public tunnel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    /// Start a tunnel (also enabled by `--ngrok`).
    pub enabled: bool,
    pub program: String,
    pub protocol: String,
    /// Local control-plane base URL.
    pub control_url: String,
    /// Wait after starting the tunnel, in milliseconds.
    pub startup_delay_ms: u64,
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Open the access URL automatically.
    pub open: bool,
    /// Wait before opening, in milliseconds.
    pub delay_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

/// Extra required software.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    pub required: Vec<RequirementConfig>,
}

/// One required application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementConfig {
    pub name: String,
    /// Candidate install locations; any one suffices.
    pub paths: Vec<String>,
    pub install_url: String,
    /// Only check on this platform ("windows", "unix"); all if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_host: String::new(),
            listen_port: 6080,
            target_host: "127.0.0.1".into(),
        }
    }
}

impl Default for VncConfig {
    fn default() -> Self {
        Self {
            geometry: "1280x800".into(),
            depth: 24,
            display: 1,
            windows_service: "tvnserver".into(),
            windows_install_dir: webdesk_core::deps::TIGHTVNC_DIR.into(),
            settle_delay_ms: 2000,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: webdesk_core::assets::DEFAULT_DIR.into(),
            repository: webdesk_core::assets::NOVNC_REPOSITORY.into(),
            landing_page: webdesk_core::assets::LANDING_PAGE.into(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            verbose: true,
        }
    }
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "ngrok".into(),
            protocol: "tcp".into(),
            control_url: "http://localhost:4040".into(),
            startup_delay_ms: 3000,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            open: true,
            delay_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            required: vec![RequirementConfig {
                name: "BlueJ".into(),
                paths: vec![
                    r"C:\Program Files\BlueJ".into(),
                    r"C:\Program Files (x86)\BlueJ".into(),
                ],
                install_url: "https://www.bluej.org".into(),
                platform: Some("windows".into()),
            }],
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl LauncherConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// VNC launcher settings. Fails on a malformed geometry.
    pub fn to_vnc_config(&self) -> Result<VncServerConfig> {
        Ok(VncServerConfig {
            geometry: self.vnc.geometry.parse::<Geometry>()?,
            depth: self.vnc.depth,
            display: self.vnc.display,
            windows_service: self.vnc.windows_service.clone(),
            windows_install_dir: PathBuf::from(&self.vnc.windows_install_dir),
            settle_delay: Duration::from_millis(self.vnc.settle_delay_ms),
        })
    }

    /// Proxy settings targeting the VNC server on `vnc_port`.
    pub fn to_proxy_config(&self, vnc_port: u16, web_root: Option<PathBuf>) -> ProxyConfig {
        ProxyConfig {
            target_host: self.network.target_host.clone(),
            target_port: vnc_port,
            listen_host: self.network.listen_host.clone(),
            listen_port: self.network.listen_port,
            web_root,
            heartbeat: (self.proxy.heartbeat_secs > 0)
                .then(|| Duration::from_secs(self.proxy.heartbeat_secs)),
            verbose: self.proxy.verbose,
        }
    }

    pub fn to_tunnel_config(&self) -> TunnelConfig {
        TunnelConfig {
            program: self.tunnel.program.clone(),
            protocol: self.tunnel.protocol.clone(),
            control_url: self.tunnel.control_url.clone(),
            startup_delay: Duration::from_millis(self.tunnel.startup_delay_ms),
            ..TunnelConfig::default()
        }
    }

    /// Built-in requirements plus configured applications for `platform`.
    pub fn dependency_checker(&self, platform: Platform) -> DependencyChecker {
        let install_dir = Path::new(&self.vnc.windows_install_dir);
        self.dependencies
            .required
            .iter()
            .filter(|r| match r.platform.as_deref() {
                Some(name) => Platform::from_name(name) == Some(platform),
                None => true,
            })
            .fold(
                DependencyChecker::for_platform(platform, install_dir),
                |checker, r| {
                    checker.require_application(Requirement::any_path(
                        r.name.clone(),
                        r.paths.iter().map(PathBuf::from),
                        r.install_url.clone(),
                    ))
                },
            )
    }
}

// ── Tests ────────────────────────────────────────────────────────
