//! Host platform detection.

/// The two platform families the launcher distinguishes.
///
/// Passed explicitly to every platform-dependent step so both branches can
/// be exercised from tests on any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    /// Parse a config name (`"windows"`, `"unix"`, `"linux"`, `"macos"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "windows" => Some(Platform::Windows),
            "unix" | "linux" | "macos" => Some(Platform::Unix),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_families() {
        assert_eq!(Platform::from_name("Windows"), Some(Platform::Windows));
        assert_eq!(Platform::from_name("linux"), Some(Platform::Unix));
        assert_eq!(Platform::from_name("macos"), Some(Platform::Unix));
        assert_eq!(Platform::from_name("plan9"), None);
    }

    #[test]
    fn current_matches_cfg() {
        assert_eq!(Platform::current().is_windows(), cfg!(windows));
    }
}
