//! Error types for the webdesk launcher.
//!
//! Fallible operations return `Result<T, WebdeskError>`. Whether an error is
//! fatal is decided by the caller: setup steps propagate it to `main`, the
//! tunnel and browser steps log it and carry on.

use thiserror::Error;

/// The canonical error type for webdesk.
#[derive(Debug, Error)]
pub enum WebdeskError {
    // ── Environment ──────────────────────────────────────────────
    /// Required software is not installed.
    #[error("{name} not found! Please install {name} from: {hint}")]
    MissingDependency { name: String, hint: String },

    /// A screen geometry string was not of the form `WIDTHxHEIGHT`.
    #[error("invalid geometry {0:?}: expected WIDTHxHEIGHT, e.g. 1280x800")]
    InvalidGeometry(String),

    // ── External processes ───────────────────────────────────────
    /// An external program could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },

    /// The web client could not be fetched.
    #[error("error setting up web client: {0}")]
    AssetFetch(String),

    // ── Network ──────────────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The tunnel control plane could not be reached.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tunnel control plane answered, but without a usable address.
    #[error("tunnel error: {0}")]
    Tunnel(String),

    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, WebdeskError>;

impl From<String> for WebdeskError {
    fn from(s: String) -> Self {
        WebdeskError::Other(s)
    }
}

impl From<&str> for WebdeskError {
    fn from(s: &str) -> Self {
        WebdeskError::Other(s.to_string())
    }
}
