//! webdesk entry point.
//!
//! ```text
//! webdesk                        Serve the desktop on port 6080
//! webdesk --port 7000            Use another proxy port
//! webdesk --geometry 1920x1080   Set the VNC screen size
//! webdesk --ngrok                Also expose the proxy through ngrok
//! webdesk --config <path>        Load a custom config TOML
//! webdesk --gen-config           Write default config to stdout
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webdesk_core::WebdeskError;
use webdesk_launcher::config::{LauncherConfig, LoggingConfig};
use webdesk_launcher::launcher::Launcher;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "webdesk", about = "Start remote desktop access through a web browser")]
struct Cli {
    /// Port for noVNC (default: 6080).
    #[arg(long)]
    port: Option<u16>,

    /// Screen geometry (default: 1280x800).
    #[arg(long)]
    geometry: Option<String>,

    /// Use ngrok for public access.
    #[arg(long)]
    ngrok: bool,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "webdesk.toml")]
    config: PathBuf,

    /// Do not open a browser.
    #[arg(long)]
    no_browser: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&LauncherConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then let flags win.
    let mut config = LauncherConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.listen_port = port;
    }
    if let Some(geometry) = cli.geometry {
        config.vnc.geometry = geometry;
    }
    if cli.ngrok {
        config.tunnel.enabled = true;
    }
    if cli.no_browser {
        config.browser.open = false;
    }

    init_tracing(&config.logging)?;

    info!("webdesk v{}", env!("CARGO_PKG_VERSION"));
    info!("proxy port: {}", config.network.listen_port);
    info!("geometry: {}", config.vnc.geometry);
    info!("tunnel: {}", config.tunnel.enabled);

    let launcher = Launcher::new(config);
    if let Err(e) = launcher.run().await {
        eprintln!("{e}");
        if let WebdeskError::MissingDependency { name, .. } = &e {
            eprintln!("After installing {name}, run this again.");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level; a configured file replaces
/// stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}
