//! noVNC web client provisioning.
//!
//! The client is cloned once into a local directory and reused on every
//! later run. A failed fetch is fatal.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, WebdeskError};
use crate::platform::Platform;
use crate::process::{CommandSpec, Spawner};

pub const NOVNC_REPOSITORY: &str = "https://github.com/novnc/noVNC.git";
pub const DEFAULT_DIR: &str = "noVNC";
pub const LANDING_PAGE: &str = "vnc.html";
pub const INDEX_PAGE: &str = "index.html";

/// What a provisioning run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// The client was cloned during this run.
    pub fetched: bool,
    /// `index.html` was created during this run.
    pub index_created: bool,
}

/// Ensures a local copy of the web client exists.
#[derive(Debug, Clone)]
pub struct AssetProvisioner {
    dir: PathBuf,
    repository: String,
    landing_page: String,
    platform: Platform,
}

impl AssetProvisioner {
    pub fn new(dir: impl Into<PathBuf>, repository: impl Into<String>, platform: Platform) -> Self {
        Self {
            dir: dir.into(),
            repository: repository.into(),
            landing_page: LANDING_PAGE.to_string(),
            platform,
        }
    }

    pub fn with_landing_page(mut self, page: impl Into<String>) -> Self {
        self.landing_page = page.into();
        self
    }

    /// Directory the client lives in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Clone the client if absent, then alias the landing page as
    /// `index.html` if that is missing.
    pub async fn provision(&self, spawner: &dyn Spawner) -> Result<ProvisionOutcome> {
        let mut outcome = ProvisionOutcome::default();

        if tokio::fs::try_exists(&self.dir).await? {
            debug!("web client present at {}", self.dir.display());
        } else {
            println!("Setting up noVNC...");
            self.fetch(spawner).await?;
            outcome.fetched = true;
        }

        outcome.index_created = self.ensure_index().await?;
        Ok(outcome)
    }

    async fn fetch(&self, spawner: &dyn Spawner) -> Result<()> {
        let clone = self.clone_command();
        spawner
            .run(&clone)
            .await
            .and_then(|outcome| outcome.check(&clone))
            .map_err(|e| WebdeskError::AssetFetch(e.to_string()))?;
        info!("cloned {} into {}", self.repository, self.dir.display());
        Ok(())
    }

    /// `git clone <repo> <name>`, run from the target's parent directory.
    fn clone_command(&self) -> CommandSpec {
        let clone = CommandSpec::new("git").arg("clone").arg(&self.repository);
        match (self.dir.parent(), self.dir.file_name()) {
            (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
                clone.arg(name.to_string_lossy()).current_dir(parent)
            }
            _ => clone.arg(self.dir.to_string_lossy()),
        }
    }

    async fn ensure_index(&self) -> Result<bool> {
        let landing = self.dir.join(&self.landing_page);
        let index = self.dir.join(INDEX_PAGE);

        if !tokio::fs::try_exists(&landing).await? || tokio::fs::try_exists(&index).await? {
            return Ok(false);
        }

        match self.platform {
            Platform::Windows => {
                tokio::fs::copy(&landing, &index).await?;
            }
            Platform::Unix => link_or_copy(&self.landing_page, &landing, &index).await?,
        }
        info!("created {} -> {}", index.display(), self.landing_page);
        Ok(true)
    }
}

#[cfg(unix)]
async fn link_or_copy(relative_target: &str, _landing: &Path, index: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(relative_target, index).await
}

#[cfg(not(unix))]
async fn link_or_copy(_relative_target: &str, landing: &Path, index: &Path) -> std::io::Result<()> {
    tokio::fs::copy(landing, index).await.map(|_| ())
}

// ── Tests ────────────────────────────────────────────────────────
