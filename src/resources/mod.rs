//! Idempotent resource primitives (check + apply pattern).
//!
//! Every change the tool makes to the machine is modelled as a resource
//! that can report its [`ResourceState`] and be brought into the desired
//! state with [`Resource::apply`]. Resources borrow the filesystem or
//! executor they act through, so tests substitute recording or mock
//! implementations without touching the resource code.
pub mod backup;
pub mod chmod;
pub mod defaults;
pub mod file;
pub mod symlink;

/// Low-level filesystem helpers shared by the production operations.
pub mod helpers {
    pub mod fs;
}

use std::path::Path;

use crate::error::FsError;
use crate::operations::FileSystemOps;

/// Create the parent directory of `path` if it is missing.
///
/// # Errors
///
/// Returns [`FsError::CreateParent`] if the directory cannot be created.
pub fn ensure_parent(ops: &dyn FileSystemOps, path: &Path) -> Result<(), FsError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || ops.exists(parent) {
        return Ok(());
    }
    ops.create_dir_all(parent)
        .map_err(|source| FsError::CreateParent {
            path: parent.to_path_buf(),
            source,
        })
}

/// Back up whatever is at `target` and remove it.
///
/// # Errors
///
/// Returns [`FsError::Backup`] or [`FsError::Remove`]. When removal fails
/// the backup stays on disk next to the untouched original.
pub fn displace(
    ops: &dyn FileSystemOps,
    target: &Path,
    stamp: &str,
) -> Result<Option<backup::BackupRecord>, FsError> {
    let Some(record) = backup::backup(ops, target, stamp)? else {
        return Ok(None);
    };
    ops.remove(target).map_err(|source| FsError::Remove {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(Some(record))
}

/// State of a resource (symlink, file, preference key, ...).
///
/// # Examples
///
/// ```
/// use dotlink::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "points to /other".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_ne!(wrong, missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// What is there instead.
        current: String,
    },
}

/// Result of applying a resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated in place.
    Applied,
    /// Something was displaced to make room; a copy lives at `backup`.
    Replaced {
        /// Backup of what used to be there.
        backup: std::path::PathBuf,
    },
}

/// Unified interface for resources that can be checked and applied.
///
/// Callers go through [`process_single`](crate::tasks::process_single),
/// which reads the state, logs it and applies only when it is not
/// [`ResourceState::Correct`].
pub trait Resource {
    /// Error returned by state checks and applies.
    type Error;

    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource can never reach the desired state
    /// (e.g. a link whose source does not exist) or its state cannot be read.
    fn current_state(&self) -> Result<ResourceState, Self::Error>;

    /// Bring the resource into the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the change fails. Implementations
    /// put displaced content back before returning where they can.
    fn apply(&self) -> Result<ResourceChange, Self::Error>;
}
