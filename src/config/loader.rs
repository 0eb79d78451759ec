//! Document loading for TOML and JSON configuration files.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// On-disk format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// TOML, selected by a `.toml` extension.
    Toml,
    /// JSON, selected by any other extension.
    Json,
}

impl Format {
    /// Choose the format from the file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Read and deserialize a configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if the file is missing,
/// [`ConfigError::Io`] if it cannot be read, and
/// [`ConfigError::InvalidSyntax`] if it does not deserialize into `T`
/// (syntax errors, missing or unknown keys, invalid values).
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content, Format::from_path(path)).map_err(|message| {
        ConfigError::InvalidSyntax {
            file: path.to_path_buf(),
            message,
        }
    })
}

/// Deserialize `content` in the given format, returning the parser's
/// message on failure.
///
/// # Errors
///
/// Returns the parser's error message when `content` is not a valid `T`.
pub fn parse_document<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, String> {
    match format {
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string().trim_end().to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
}
