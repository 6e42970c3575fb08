//! # webdesk-core
//!
//! Building blocks for serving a VNC desktop to a web browser.
//!
//! This crate contains:
//! - **Deps**: `DependencyChecker` for installed-software checks
//! - **Setup**: the manual TightVNC configuration gate
//! - **Assets**: `AssetProvisioner` fetching the noVNC client
//! - **Process**: `Spawner` abstraction over external programs
//! - **VNC**: `VncServerLauncher` and `Geometry`
//! - **Proxy**: `WebSocketProxy`, a WebSocket-to-TCP bridge that also serves
//!   the web client
//! - **Tunnel**: `TunnelManager` driving ngrok through its control plane
//! - **Net / Browser**: local address resolution, access URLs, browser launch
//! - **Error**: `WebdeskError`, a `thiserror`-based error type

pub mod assets;
pub mod browser;
pub mod deps;
pub mod error;
pub mod net;
pub mod platform;
pub mod process;
pub mod proxy;
pub mod setup;
pub mod tunnel;
pub mod vnc;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use assets::{AssetProvisioner, ProvisionOutcome};
pub use deps::{DependencyChecker, PathProbe, Requirement, SystemProbe};
pub use error::{Result, WebdeskError};
pub use platform::Platform;
pub use process::{CommandSpec, SpawnedProcess, Spawner, SystemSpawner};
pub use proxy::{ProxyConfig, WebSocketProxy};
pub use tunnel::{PublicTunnel, TunnelConfig, TunnelManager};
pub use vnc::{Geometry, VncServerConfig, VncServerHandle, VncServerLauncher};
