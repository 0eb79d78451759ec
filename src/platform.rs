//! Operating system detection.
use std::fmt;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, or any Unix-like system that is not macOS.
    Linux,
    /// macOS.
    MacOs,
    /// Anything else (Windows, BSDs without special handling).
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system the binary is running on.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Create a platform with an explicit OS (used by tests to exercise
    /// platform-gated tasks on any host).
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether macOS-only tasks should run.
    #[must_use]
    pub const fn is_macos(&self) -> bool {
        matches!(self.os, Os::MacOs)
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "linux") || cfg!(unix) {
            Os::Linux
        } else {
            Os::Other
        }
    }
}
