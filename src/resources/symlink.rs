//! Symlink resource.
use std::path::{Path, PathBuf};

use super::{Resource, ResourceChange, ResourceState, backup, displace, ensure_parent};
use crate::config::expand::normalize;
use crate::error::{EntryError, LinkError};
use crate::operations::FileSystemOps;

/// A symlink at `target` pointing to `source`.
#[derive(Debug)]
pub struct SymlinkResource<'a> {
    /// The source file/directory (what the symlink points to).
    pub source: PathBuf,
    /// The target path (where the symlink will be created).
    pub target: PathBuf,
    ops: &'a dyn FileSystemOps,
    stamp: &'a str,
}

impl<'a> SymlinkResource<'a> {
    /// Create a new symlink resource. `stamp` names any backup taken.
    #[must_use]
    pub const fn new(
        source: PathBuf,
        target: PathBuf,
        ops: &'a dyn FileSystemOps,
        stamp: &'a str,
    ) -> Self {
        Self {
            source,
            target,
            ops,
            stamp,
        }
    }

    /// Where the existing link at `target` points, resolved against the
    /// link's own directory when its text is relative.
    fn resolved_link(&self) -> Option<PathBuf> {
        let text = self.ops.read_link(&self.target).ok()?;
        if text.is_absolute() {
            return Some(normalize(&text));
        }
        let dir = self.target.parent().unwrap_or_else(|| Path::new("/"));
        Some(normalize(&dir.join(text)))
    }

    fn source_missing(&self) -> EntryError {
        LinkError::SourceMissing {
            path: self.source.clone(),
        }
        .into()
    }
}

impl Resource for SymlinkResource<'_> {
    type Error = EntryError;

    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn current_state(&self) -> Result<ResourceState, EntryError> {
        if !self.ops.exists(&self.source) {
            return Err(self.source_missing());
        }

        if self.ops.is_symlink(&self.target) {
            return Ok(match self.resolved_link() {
                Some(dest) if dest == normalize(&self.source) => ResourceState::Correct,
                Some(dest) => ResourceState::Incorrect {
                    current: format!("points to {}", dest.display()),
                },
                None => ResourceState::Incorrect {
                    current: "unreadable symlink".to_string(),
                },
            });
        }

        if self.ops.is_dir(&self.target) {
            Ok(ResourceState::Incorrect {
                current: "target is a directory".to_string(),
            })
        } else if self.ops.exists(&self.target) {
            Ok(ResourceState::Incorrect {
                current: "target is a regular file".to_string(),
            })
        } else {
            Ok(ResourceState::Missing)
        }
    }

    fn apply(&self) -> Result<ResourceChange, EntryError> {
        if !self.ops.exists(&self.source) {
            return Err(self.source_missing());
        }

        ensure_parent(self.ops, &self.target)?;
        let record = displace(self.ops, &self.target, self.stamp)?;

        if let Err(cause) = self.ops.symlink(&self.source, &self.target) {
            let err = match record {
                None => LinkError::Create {
                    target: self.target.clone(),
                    points_to: self.source.clone(),
                    source: cause,
                },
                Some(record) => match backup::restore(self.ops, &record) {
                    Ok(()) => LinkError::Create {
                        target: self.target.clone(),
                        points_to: self.source.clone(),
                        source: cause,
                    },
                    Err(source) => LinkError::CreateNotRestored {
                        target: self.target.clone(),
                        points_to: self.source.clone(),
                        cause,
                        source,
                    },
                },
            };
            return Err(err.into());
        }

        Ok(record.map_or(ResourceChange::Applied, |r| ResourceChange::Replaced {
            backup: r.backup,
        }))
    }
}

#[cfg(all(test, unix))]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use crate::operations::{RecordingFileSystemOps, SystemFileSystemOps};
    use std::fs;
    use std::os::unix::fs::symlink;

    const STAMP: &str = "20240301_120000";

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("repo/vimrc");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "set nocompatible").unwrap();
        let target = dir.path().join("home/.vimrc");
        (dir, source, target)
    }

    // -----------------------------------------------------------------------
    // current_state
    // -----------------------------------------------------------------------

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = SymlinkResource::new(
            dir.path().join("nope"),
            dir.path().join("link"),
            &SystemFileSystemOps,
            STAMP,
        );
        let err = r.current_state().unwrap_err();
        assert!(matches!(err, EntryError::Link(LinkError::SourceMissing { .. })));
    }

    #[test]
    fn missing_target() {
        let (_dir, source, target) = setup();
        let r = SymlinkResource::new(source, target, &SystemFileSystemOps, STAMP);
        assert_eq!(r.current_state().unwrap(), ResourceState::Missing);
    }

    #[test]
    fn correct_absolute_link() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        symlink(&source, &target).unwrap();
        let r = SymlinkResource::new(source, target, &SystemFileSystemOps, STAMP);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn correct_relative_link() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        symlink("../repo/vimrc", &target).unwrap();
        let r = SymlinkResource::new(source, target, &SystemFileSystemOps, STAMP);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn link_to_elsewhere_is_incorrect() {
        let (dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        let other = dir.path().join("other");
        symlink(&other, &target).unwrap();
        let r = SymlinkResource::new(source, target, &SystemFileSystemOps, STAMP);
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Incorrect {
                current: format!("points to {}", other.display())
            }
        );
    }

    #[test]
    fn real_directory_is_incorrect() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(&target).unwrap();
        let r = SymlinkResource::new(source, target, &SystemFileSystemOps, STAMP);
        assert!(matches!(
            r.current_state().unwrap(),
            ResourceState::Incorrect { current } if current.contains("directory")
        ));
    }

    // -----------------------------------------------------------------------
    // apply
    // -----------------------------------------------------------------------

    #[test]
    fn apply_creates_parent_and_link() {
        let (_dir, source, target) = setup();
        let r = SymlinkResource::new(source.clone(), target.clone(), &SystemFileSystemOps, STAMP);

        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(fs::read_link(&target).unwrap(), source);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn apply_backs_up_existing_file() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "user data").unwrap();
        let r = SymlinkResource::new(source.clone(), target.clone(), &SystemFileSystemOps, STAMP);

        let change = r.apply().unwrap();

        let ResourceChange::Replaced { backup } = change else {
            panic!("expected a backup, got {change:?}");
        };
        assert_eq!(backup, target.with_file_name(".vimrc.backup_20240301_120000"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "user data");
        assert_eq!(fs::read_link(&target).unwrap(), source);
    }

    #[test]
    fn apply_replaces_directory_tree() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested/file"), "x").unwrap();
        let r = SymlinkResource::new(source.clone(), target.clone(), &SystemFileSystemOps, STAMP);

        let ResourceChange::Replaced { backup } = r.apply().unwrap() else {
            panic!("expected a backup");
        };
        assert_eq!(fs::read_to_string(backup.join("nested/file")).unwrap(), "x");
        assert_eq!(fs::read_link(&target).unwrap(), source);
    }

    #[test]
    fn apply_does_not_create_existing_parent() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        let ops = RecordingFileSystemOps::new();
        let r = SymlinkResource::new(source, target.clone(), &ops, STAMP);

        r.apply().unwrap();

        assert_eq!(ops.mutations(), vec![format!("symlink {}", target.display())]);
    }

    #[test]
    fn failed_link_restores_original() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "user data").unwrap();
        let ops = RecordingFileSystemOps::denying_symlinks();
        let r = SymlinkResource::new(source, target.clone(), &ops, STAMP);

        let err = r.apply().unwrap_err();

        assert!(
            matches!(&err, EntryError::Link(LinkError::Create { source, .. })
                if source.kind() == std::io::ErrorKind::PermissionDenied),
            "unexpected error: {err}"
        );
        assert_eq!(fs::read_to_string(&target).unwrap(), "user data");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "backup should have been renamed back");
    }

    #[test]
    fn failed_link_without_original_reports_create() {
        let (_dir, source, target) = setup();
        let ops = RecordingFileSystemOps::denying_symlinks();
        let r = SymlinkResource::new(source, target.clone(), &ops, STAMP);

        let err = r.apply().unwrap_err();

        assert!(matches!(err, EntryError::Link(LinkError::Create { .. })));
        assert!(fs::symlink_metadata(&target).is_err());
    }

    #[test]
    fn blocked_restore_keeps_backup_and_names_it() {
        let (_dir, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "user data").unwrap();
        let ops = RecordingFileSystemOps::occupying_failed_symlinks();
        let r = SymlinkResource::new(source, target.clone(), &ops, STAMP);

        let err = r.apply().unwrap_err();

        let backup = target.with_file_name(format!(".vimrc.backup_{STAMP}"));
        assert!(
            matches!(
                &err,
                EntryError::Link(LinkError::CreateNotRestored {
                    source: FsError::RestoreBlocked { .. },
                    ..
                })
            ),
            "unexpected error: {err}"
        );
        assert_eq!(fs::read_to_string(&backup).unwrap(), "user data");
        assert!(err.to_string().contains(&backup.display().to_string()), "{err}");
        assert!(!ops.mutations().iter().any(|m| m.starts_with("rename")));
    }

    #[test]
    fn apply_with_missing_source_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("link");
        fs::write(&target, "keep").unwrap();
        let ops = RecordingFileSystemOps::new();
        let r = SymlinkResource::new(dir.path().join("nope"), target, &ops, STAMP);

        assert!(r.apply().is_err());
        assert!(ops.mutations().is_empty());
    }
}
