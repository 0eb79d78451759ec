//! macOS preference defaults document.
//!
//! ```toml
//! [[settings.dock]]
//! domain = "com.apple.dock"
//! settings = { autohide = true, tilesize = 36 }
//!
//! [default_apps]
//! "com.microsoft.VSCode" = [".md", "public.json"]
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::loader::load_document;
use crate::error::ConfigError;

/// Domain fragments whose preferences can only be written as root.
const SUDO_DOMAINS: &[&str] = &[
    "/Library/Preferences/",
    "com.apple.loginwindow",
    "com.apple.WindowManager",
];

/// A value accepted by `defaults write`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultsValue {
    /// Written with `-bool`.
    Bool(bool),
    /// Written with `-int`.
    Int(i64),
    /// Written with `-float`.
    Float(f64),
    /// Written with `-string`.
    String(String),
}

impl DefaultsValue {
    /// The `defaults write` type flag for this value.
    #[must_use]
    pub const fn type_flag(&self) -> &'static str {
        match self {
            Self::Bool(_) => "-bool",
            Self::Int(_) => "-int",
            Self::Float(_) => "-float",
            Self::String(_) => "-string",
        }
    }

    /// Whether the trimmed output of `defaults read` already equals this
    /// value. Booleans are stored as `1`/`0`.
    #[must_use]
    pub fn matches_read(&self, output: &str) -> bool {
        let current = output.trim();
        match self {
            Self::Bool(b) => current == if *b { "1" } else { "0" },
            Self::Int(i) => current.parse::<i64>().is_ok_and(|v| v == *i),
            Self::Float(f) => current
                .parse::<f64>()
                .is_ok_and(|v| (v - f).abs() < f64::EPSILON),
            Self::String(s) => current == s,
        }
    }
}

impl fmt::Display for DefaultsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Keys to write for one preference domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainSettings {
    /// Preference domain, e.g. `com.apple.dock`.
    pub domain: String,
    /// Key → value pairs.
    pub settings: BTreeMap<String, DefaultsValue>,
}

impl DomainSettings {
    /// Whether writes to this domain must go through `sudo`.
    #[must_use]
    pub fn needs_sudo(&self) -> bool {
        SUDO_DOMAINS.iter().any(|d| self.domain.contains(d))
    }
}

/// The whole macOS settings document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacosSettings {
    /// Section name (`dock`, `finder`, ...) → domains.
    pub settings: BTreeMap<String, Vec<DomainSettings>>,
    /// Application bundle id → file extensions or UTIs it should open.
    #[serde(default)]
    pub default_apps: BTreeMap<String, Vec<String>>,
}

impl MacosSettings {
    /// Load the document from `path` (TOML or JSON by extension).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }
}

/// Process to `killall` after settings in `section` change.
#[must_use]
pub fn restart_target(section: &str) -> Option<&'static str> {
    match section {
        "dock" | "hot_corners" => Some("Dock"),
        "finder" => Some("Finder"),
        "keyboard" | "trackpad" => Some("SystemUIServer"),
        _ => None,
    }
}
