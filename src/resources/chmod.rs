//! File permission resource.
use std::path::PathBuf;

use super::{Resource, ResourceChange, ResourceState};
use crate::error::{EntryError, FsError};
use crate::operations::FileSystemOps;

/// Permission bits on `target`.
///
/// Modes follow symlinks, so applying this to a freshly created link
/// changes the mode of the file it points to.
#[derive(Debug)]
pub struct ChmodResource<'a> {
    /// Path whose mode is set.
    pub target: PathBuf,
    /// Desired permission bits.
    pub mode: u32,
    ops: &'a dyn FileSystemOps,
}

impl<'a> ChmodResource<'a> {
    /// Create a new chmod resource.
    #[must_use]
    pub const fn new(target: PathBuf, mode: u32, ops: &'a dyn FileSystemOps) -> Self {
        Self { target, mode, ops }
    }
}

impl Resource for ChmodResource<'_> {
    type Error = EntryError;

    fn description(&self) -> String {
        format!("{:o} {}", self.mode, self.target.display())
    }

    fn current_state(&self) -> Result<ResourceState, EntryError> {
        if !self.ops.exists(&self.target) {
            return Ok(ResourceState::Missing);
        }
        Ok(match self.ops.mode(&self.target) {
            Ok(current) if current == self.mode => ResourceState::Correct,
            Ok(current) => ResourceState::Incorrect {
                current: format!("{current:o}"),
            },
            Err(e) => ResourceState::Incorrect {
                current: format!("unknown ({e})"),
            },
        })
    }

    fn apply(&self) -> Result<ResourceChange, EntryError> {
        self.ops
            .set_mode(&self.target, self.mode)
            .map_err(|source| FsError::Chmod {
                path: self.target.clone(),
                mode: self.mode,
                source,
            })?;
        Ok(ResourceChange::Applied)
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::SystemFileSystemOps;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn description_shows_octal_mode() {
        let r = ChmodResource::new(PathBuf::from("/tmp/key"), 0o600, &SystemFileSystemOps);
        assert_eq!(r.description(), "600 /tmp/key");
    }

    #[test]
    fn missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let r = ChmodResource::new(dir.path().join("nope"), 0o600, &SystemFileSystemOps);
        assert_eq!(r.current_state().unwrap(), ResourceState::Missing);
    }

    #[test]
    fn incorrect_then_correct_after_apply() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("key");
        fs::write(&file, "secret").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let r = ChmodResource::new(file.clone(), 0o600, &SystemFileSystemOps);
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "644".to_string()
            }
        );

        r.apply().unwrap();
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o7777, 0o600);
    }

    #[test]
    fn mode_follows_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("script");
        fs::write(&file, "#!/bin/sh").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&file, &link).unwrap();

        ChmodResource::new(link, 0o755, &SystemFileSystemOps)
            .apply()
            .unwrap();

        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o7777, 0o755);
    }

    #[test]
    fn apply_on_missing_target_is_chmod_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChmodResource::new(dir.path().join("nope"), 0o600, &SystemFileSystemOps)
            .apply()
            .unwrap_err();
        assert!(matches!(err, EntryError::Fs(FsError::Chmod { mode: 0o600, .. })));
    }
}
