//! External process plumbing.
//!
//! Every program the launcher drives (`git`, `vncserver`, `net`, `ngrok`,
//! the browser opener) is described by a [`CommandSpec`] and started through
//! a [`Spawner`]. Production code uses [`SystemSpawner`]; tests substitute a
//! recording fake.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, WebdeskError};

// ── CommandSpec ──────────────────────────────────────────────────

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits ours.
    pub cwd: Option<PathBuf>,
    /// Discard the child's stdout/stderr.
    pub quiet: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            quiet: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run from `dir` instead of our working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ── Results ──────────────────────────────────────────────────────

/// Handle of a child that was started and left running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub command: String,
}

/// How a run-to-completion command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutcome {
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "signal".to_string(),
        }
    }

    /// `Ok` on a zero exit, otherwise [`WebdeskError::CommandFailed`].
    pub fn check(&self, cmd: &CommandSpec) -> Result<()> {
        if self.success {
            return Ok(());
        }
        Err(WebdeskError::CommandFailed {
            command: cmd.to_string(),
            status: self.status_text(),
        })
    }
}

// ── Spawner ──────────────────────────────────────────────────────

/// Starts external programs.
#[async_trait]
pub trait Spawner: Send + Sync {
    /// Start `cmd` and return immediately, leaving the child running.
    fn spawn(&self, cmd: &CommandSpec) -> Result<SpawnedProcess>;

    /// Run `cmd` to completion.
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutcome>;
}

/// [`Spawner`] backed by real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

#[async_trait]
impl Spawner for SystemSpawner {
    fn spawn(&self, cmd: &CommandSpec) -> Result<SpawnedProcess> {
        debug!("spawning `{cmd}`");
        // The child is intentionally not killed when the handle drops.
        let child = cmd.to_command().spawn().map_err(|source| WebdeskError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
        Ok(SpawnedProcess {
            pid: child.id(),
            command: cmd.to_string(),
        })
    }

    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutcome> {
        debug!("running `{cmd}`");
        let status = cmd
            .to_command()
            .status()
            .await
            .map_err(|source| WebdeskError::Spawn {
                command: cmd.to_string(),
                source,
            })?;
        Ok(CommandOutcome {
            success: status.success(),
            code: status.code(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let cmd = CommandSpec::new("vncserver").args([":1", "-depth", "24"]);
        assert_eq!(cmd.to_string(), "vncserver :1 -depth 24");
    }

    #[test]
    fn builder_sets_quiet() {
        let cmd = CommandSpec::new("ngrok").arg("tcp").quiet();
        assert!(cmd.quiet);
        assert_eq!(cmd.args, vec!["tcp".to_string()]);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = CommandSpec::new("webdesk-definitely-not-a-real-program").quiet();
        let err = SystemSpawner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, WebdeskError::Spawn { .. }));
    }

    #[test]
    fn outcome_status_text() {
        let ok = CommandOutcome { success: false, code: Some(2) };
        assert_eq!(ok.status_text(), "exit code 2");
    }

    #[test]
    fn failed_outcome_is_command_failed() {
        let cmd = CommandSpec::new("git").arg("clone");
        let failed = CommandOutcome { success: false, code: Some(128) };
        let err = failed.check(&cmd).unwrap_err();
        assert!(matches!(err, WebdeskError::CommandFailed { .. }));
        assert_eq!(err.to_string(), "`git clone` exited with exit code 128");

        let ok = CommandOutcome { success: true, code: Some(0) };
        assert!(ok.check(&cmd).is_ok());
    }

    #[tokio::test]
    async fn current_dir_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let cmd = if cfg!(windows) {
            CommandSpec::new("cmd").args(["/C", "type marker.txt"])
        } else {
            CommandSpec::new("cat").arg("marker.txt")
        };
        let cmd = cmd.current_dir(tmp.path()).quiet();
        assert_eq!(cmd.cwd.as_deref(), Some(tmp.path()));

        std::fs::write(tmp.path().join("marker.txt"), "x").unwrap();
        let outcome = SystemSpawner.run(&cmd).await.unwrap();
        assert!(outcome.success);
    }
}
