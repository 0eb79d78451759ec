//! Domain-specific error types for dotlink.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Manifest loading returns [`ConfigError`], which is fatal for the whole
//! run. Everything that can go wrong with a single manifest entry is an
//! [`EntryError`]; the reconciler turns those into a failed outcome for the
//! entry and moves on. Command handlers at the CLI boundary convert to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ConfigError                   : manifest missing, unreadable or malformed (fatal)
//! EntryError
//! ├── PathResolution(PathResolutionError) : target template cannot be resolved
//! ├── Link(LinkError)                     : source missing, symlink creation failed
//! └── Fs(FsError)                         : backup, removal, restore, chmod, write
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that arise while loading a manifest or settings document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {}", path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// No manifest was given and none of the default names exist under the root.
    #[error("no manifest found in {} (tried {tried})", root.display())]
    NoManifest {
        /// Root directory that was searched.
        root: PathBuf,
        /// Comma-separated list of the file names that were tried.
        tried: String,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file is not valid for its format, is missing required keys,
    /// carries unknown keys, or holds an invalid value.
    #[error("invalid configuration in {}: {message}", file.display())]
    InvalidSyntax {
        /// File that failed to parse.
        file: PathBuf,
        /// Parser or validation message.
        message: String,
    },
}

/// Errors that arise while turning a path template into a concrete path.
#[derive(Error, Debug)]
pub enum PathResolutionError {
    /// The template has no components.
    #[error("path template is empty")]
    EmptyTemplate,

    /// A `$VAR` token is still present after manifest and environment
    /// substitution.
    #[error("unresolved variable ${name} in path component '{component}'")]
    UnresolvedVariable {
        /// Name of the unresolved variable, without `$`.
        name: String,
        /// Template component it appeared in.
        component: String,
    },

    /// The template starts with `~` but the home directory is unknown.
    #[error("cannot expand '~' in '{component}': home directory is unknown")]
    NoHomeDirectory {
        /// Template component starting with `~`.
        component: String,
    },

    /// A relative path could not be anchored to the current directory.
    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

/// Errors that arise from the symlink step itself.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The entry's source path does not exist.
    #[error("source path does not exist: {}", path.display())]
    SourceMissing {
        /// Absolute source path that was expected.
        path: PathBuf,
    },

    /// Creating the symlink failed. Any backup taken beforehand was restored.
    #[error("failed to create symlink {} -> {}: {source}", target.display(), points_to.display())]
    Create {
        /// Where the symlink was to be created.
        target: PathBuf,
        /// What the symlink was to point at.
        points_to: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Creating the symlink failed and the backup could not be put back.
    /// The backup is still on disk.
    #[error(
        "failed to create symlink {} -> {}: {cause}; restore failed: {source}",
        target.display(),
        points_to.display()
    )]
    CreateNotRestored {
        /// Where the symlink was to be created.
        target: PathBuf,
        /// What the symlink was to point at.
        points_to: PathBuf,
        /// Error from the symlink call.
        cause: io::Error,
        /// Error from the restore attempt.
        source: FsError,
    },
}

/// Errors that arise from filesystem operations around the link step.
#[derive(Error, Debug)]
pub enum FsError {
    /// The parent directory of a target could not be created.
    #[error("failed to create parent directory {}: {source}", path.display())]
    CreateParent {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A pre-existing target could not be copied aside.
    #[error("failed to create backup of {}: {source}", path.display())]
    Backup {
        /// Path that was being backed up.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A pre-existing target could not be removed after it was backed up.
    #[error("failed to remove existing target {}: {source}", path.display())]
    Remove {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The backup could not be moved back to the original path.
    #[error("failed to restore {} from {}: {source}", original.display(), backup.display())]
    Restore {
        /// Path the backup was to be moved back to.
        original: PathBuf,
        /// Backup that is still on disk.
        backup: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Something already exists at the original path, so the backup was
    /// left where it is.
    #[error(
        "cannot restore {}: path is occupied, backup kept at {}",
        original.display(),
        backup.display()
    )]
    RestoreBlocked {
        /// Path that is occupied.
        original: PathBuf,
        /// Backup that is still on disk.
        backup: PathBuf,
    },

    /// The requested mode could not be applied.
    #[error("failed to set mode {mode:o} on {}: {source}", path.display())]
    Chmod {
        /// Path whose mode could not be set.
        path: PathBuf,
        /// Requested permission bits.
        mode: u32,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A file entry's content could not be written.
    #[error("failed to write file {}: {source}", path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Writing failed and the backup could not be put back.
    #[error("failed to write file {}: {cause}; restore failed: {source}", path.display())]
    WriteNotRestored {
        /// File that could not be written.
        path: PathBuf,
        /// Error from the write.
        cause: io::Error,
        /// Error from the restore attempt.
        source: Box<Self>,
    },
}

/// Everything that can fail a single manifest entry.
#[derive(Error, Debug)]
pub enum EntryError {
    /// The target template could not be resolved.
    #[error(transparent)]
    PathResolution(#[from] PathResolutionError),

    /// The source is missing or the symlink could not be created.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A backup, removal, restore, chmod or write failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}
