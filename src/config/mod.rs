//! Configuration documents: the link manifest and macOS settings.
pub mod expand;
pub mod loader;
pub mod macos;
pub mod manifest;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Manifest file names tried, in order, when none is given explicitly.
pub const DEFAULT_MANIFESTS: &[&str] = &["links.toml", "links.json"];

/// macOS settings file names tried, in order.
pub const DEFAULT_MACOS_SETTINGS: &[&str] = &["macos.toml", "macos.json"];

/// Return the first of `names` that exists under `root`.
///
/// # Errors
///
/// Returns [`ConfigError::NoManifest`] if none of them exist.
pub fn find_default(root: &Path, names: &[&str]) -> Result<PathBuf, ConfigError> {
    names
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigError::NoManifest {
            root: root.to_path_buf(),
            tried: names.join(", "),
        })
}
