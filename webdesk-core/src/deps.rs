//! Installed-software checks.
//!
//! Absence of anything mandatory is fatal: the checker reports the first
//! missing requirement and the binary exits. There are no retries.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, WebdeskError};
use crate::platform::Platform;

/// Default TightVNC installation directory on Windows.
pub const TIGHTVNC_DIR: &str = r"C:\Program Files\TightVNC";
pub const TIGHTVNC_URL: &str = "https://www.tightvnc.com/download.php";
pub const TIGERVNC_URL: &str = "https://tigervnc.org";

// ── PathProbe ────────────────────────────────────────────────────

/// Filesystem and `PATH` lookups, abstracted for tests.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;

    /// Locate an executable on `PATH`.
    fn find_program(&self, name: &str) -> Option<PathBuf>;
}

/// [`PathProbe`] over the real filesystem and the `PATH` variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl PathProbe for SystemProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path).find_map(|dir| {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{name}.exe"));
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    }
}

// ── Requirement ──────────────────────────────────────────────────

/// How a requirement is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementKind {
    /// Any one of these paths exists.
    AnyPath(Vec<PathBuf>),
    /// The program is on `PATH`.
    Program(String),
}

/// A piece of software the launcher cannot work without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Display name, e.g. `"TightVNC"`.
    pub name: String,
    /// Where to get it.
    pub hint: String,
    pub kind: RequirementKind,
}

impl Requirement {
    pub fn any_path<I, P>(name: impl Into<String>, paths: I, hint: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            hint: hint.into(),
            kind: RequirementKind::AnyPath(paths.into_iter().map(Into::into).collect()),
        }
    }

    pub fn program(
        name: impl Into<String>,
        program: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hint: hint.into(),
            kind: RequirementKind::Program(program.into()),
        }
    }

    pub fn is_satisfied(&self, probe: &dyn PathProbe) -> bool {
        match &self.kind {
            RequirementKind::AnyPath(paths) => paths.iter().any(|p| probe.exists(p)),
            RequirementKind::Program(name) => probe.find_program(name).is_some(),
        }
    }

    fn to_error(&self) -> WebdeskError {
        WebdeskError::MissingDependency {
            name: self.name.clone(),
            hint: self.hint.clone(),
        }
    }
}

// ── DependencyChecker ────────────────────────────────────────────

/// Ordered list of requirements for one platform.
///
/// Applications the session is for are checked before the VNC server, the
/// order an operator would install them in.
#[derive(Debug, Clone, Default)]
pub struct DependencyChecker {
    applications: Vec<Requirement>,
    builtins: Vec<Requirement>,
}

impl DependencyChecker {
    /// Checker with no requirements at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in requirements: the VNC server for `platform`.
    ///
    /// `tightvnc_dir` is only consulted on Windows.
    pub fn for_platform(platform: Platform, tightvnc_dir: &Path) -> Self {
        let vnc = match platform {
            Platform::Windows => {
                Requirement::any_path("TightVNC", [tightvnc_dir.to_path_buf()], TIGHTVNC_URL)
            }
            Platform::Unix => Requirement::program("vncserver", "vncserver", TIGERVNC_URL),
        };
        Self {
            applications: Vec::new(),
            builtins: vec![vnc],
        }
    }

    /// Add an application requirement.
    pub fn require_application(mut self, requirement: Requirement) -> Self {
        self.applications.push(requirement);
        self
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.applications.iter().chain(self.builtins.iter())
    }

    /// All unsatisfied requirements, in order.
    pub fn missing(&self, probe: &dyn PathProbe) -> Vec<&Requirement> {
        self.requirements()
            .filter(|r| !r.is_satisfied(probe))
            .collect()
    }

    /// `Ok` when everything is installed, otherwise the first missing
    /// requirement as [`WebdeskError::MissingDependency`].
    pub fn check(&self, probe: &dyn PathProbe) -> Result<()> {
        let mut count = 0;
        for req in self.requirements() {
            count += 1;
            if req.is_satisfied(probe) {
                debug!("dependency {} found", req.name);
            } else {
                return Err(req.to_error());
            }
        }
        info!("all {count} dependencies present");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Default)]
    struct FakeProbe {
        paths: HashSet<PathBuf>,
        programs: HashSet<String>,
    }

    impl FakeProbe {
        fn with_path(mut self, p: &str) -> Self {
            self.paths.insert(PathBuf::from(p));
            self
        }

        fn with_program(mut self, p: &str) -> Self {
            self.programs.insert(p.to_string());
            self
        }
    }

    impl PathProbe for FakeProbe {
        fn exists(&self, path: &Path) -> bool {
            self.paths.contains(path)
        }

        fn find_program(&self, name: &str) -> Option<PathBuf> {
            self.programs
                .contains(name)
                .then(|| PathBuf::from("/usr/bin").join(name))
        }
    }

    fn bluej() -> Requirement {
        Requirement::any_path(
            "BlueJ",
            [r"C:\Program Files\BlueJ", r"C:\Program Files (x86)\BlueJ"],
            "https://www.bluej.org",
        )
    }

    #[test]
    fn windows_fails_without_tightvnc() {
        let checker = DependencyChecker::for_platform(Platform::Windows, Path::new(TIGHTVNC_DIR));
        let err = checker.check(&FakeProbe::default()).unwrap_err();
        match err {
            WebdeskError::MissingDependency { name, hint } => {
                assert_eq!(name, "TightVNC");
                assert_eq!(hint, TIGHTVNC_URL);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn windows_passes_with_tightvnc() {
        let checker = DependencyChecker::for_platform(Platform::Windows, Path::new(TIGHTVNC_DIR));
        let probe = FakeProbe::default().with_path(TIGHTVNC_DIR);
        assert!(checker.check(&probe).is_ok());
    }

    #[test]
    fn unix_requires_vncserver_on_path() {
        let checker = DependencyChecker::for_platform(Platform::Unix, Path::new(TIGHTVNC_DIR));
        assert!(checker.check(&FakeProbe::default()).is_err());
        let probe = FakeProbe::default().with_program("vncserver");
        assert!(checker.check(&probe).is_ok());
    }

    #[test]
    fn any_candidate_path_satisfies() {
        let probe = FakeProbe::default().with_path(r"C:\Program Files (x86)\BlueJ");
        assert!(bluej().is_satisfied(&probe));
    }

    #[test]
    fn application_is_reported_before_vnc_server() {
        let checker = DependencyChecker::for_platform(Platform::Windows, Path::new(TIGHTVNC_DIR))
            .require_application(bluej());
        let missing = checker.missing(&FakeProbe::default());
        let names: Vec<_> = missing.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["BlueJ", "TightVNC"]);
    }

    #[test]
    fn empty_checker_always_passes() {
        assert!(DependencyChecker::empty().check(&FakeProbe::default()).is_ok());
    }

    #[test]
    fn system_probe_finds_nothing_for_bogus_program() {
        assert!(SystemProbe.find_program("webdesk-no-such-tool").is_none());
    }
}
