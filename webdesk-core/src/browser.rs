//! Default browser launch.

use tracing::{debug, warn};

use crate::platform::Platform;
use crate::process::{CommandSpec, Spawner};

/// Platform command that opens `url` in the default browser.
pub fn opener(platform: Platform, url: &str) -> CommandSpec {
    match platform {
        Platform::Windows => CommandSpec::new("cmd").args(["/C", "start", ""]).arg(url),
        Platform::Unix if cfg!(target_os = "macos") => CommandSpec::new("open").arg(url),
        Platform::Unix => CommandSpec::new("xdg-open").arg(url),
    }
    .quiet()
}

/// Open `url`. Returns whether the opener started; failure is only logged.
pub fn open_browser(platform: Platform, url: &str, spawner: &dyn Spawner) -> bool {
    match spawner.spawn(&opener(platform, url)) {
        Ok(p) => {
            debug!("browser opener started: {}", p.command);
            true
        }
        Err(e) => {
            warn!("could not open a browser: {e}; open {url} manually");
            false
        }
    }
}
