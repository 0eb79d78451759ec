//! Literal file content resource.
use std::path::PathBuf;

use super::{Resource, ResourceChange, ResourceState, backup, displace, ensure_parent};
use crate::error::{EntryError, FsError};
use crate::operations::FileSystemOps;

/// A regular file at `target` holding exactly `content`.
#[derive(Debug)]
pub struct FileResource<'a> {
    /// Desired file content.
    pub content: String,
    /// Where the file is written.
    pub target: PathBuf,
    /// Permission bits to apply after writing.
    pub mode: Option<u32>,
    ops: &'a dyn FileSystemOps,
    stamp: &'a str,
}

impl<'a> FileResource<'a> {
    /// Create a new file resource. `stamp` names any backup taken.
    #[must_use]
    pub const fn new(
        content: String,
        target: PathBuf,
        mode: Option<u32>,
        ops: &'a dyn FileSystemOps,
        stamp: &'a str,
    ) -> Self {
        Self {
            content,
            target,
            mode,
            ops,
            stamp,
        }
    }

    fn content_matches(&self) -> bool {
        !self.ops.is_symlink(&self.target)
            && !self.ops.is_dir(&self.target)
            && self
                .ops
                .read(&self.target)
                .is_ok_and(|bytes| bytes == self.content.as_bytes())
    }

    fn set_mode(&self) -> Result<(), FsError> {
        let Some(mode) = self.mode else {
            return Ok(());
        };
        self.ops
            .set_mode(&self.target, mode)
            .map_err(|source| FsError::Chmod {
                path: self.target.clone(),
                mode,
                source,
            })
    }
}

impl Resource for FileResource<'_> {
    type Error = EntryError;

    fn description(&self) -> String {
        format!("{} ({} bytes)", self.target.display(), self.content.len())
    }

    fn current_state(&self) -> Result<ResourceState, EntryError> {
        if !self.ops.lexists(&self.target) {
            return Ok(ResourceState::Missing);
        }
        if self.ops.is_symlink(&self.target) {
            return Ok(ResourceState::Incorrect {
                current: "target is a symlink".to_string(),
            });
        }
        if self.ops.is_dir(&self.target) {
            return Ok(ResourceState::Incorrect {
                current: "target is a directory".to_string(),
            });
        }
        if !self.content_matches() {
            return Ok(ResourceState::Incorrect {
                current: "content differs".to_string(),
            });
        }
        if let Some(mode) = self.mode {
            match self.ops.mode(&self.target) {
                Ok(current) if current == mode => {}
                Ok(current) => {
                    return Ok(ResourceState::Incorrect {
                        current: format!("mode {current:o}"),
                    });
                }
                Err(_) => {
                    return Ok(ResourceState::Incorrect {
                        current: "mode unreadable".to_string(),
                    });
                }
            }
        }
        Ok(ResourceState::Correct)
    }

    fn apply(&self) -> Result<ResourceChange, EntryError> {
        if self.content_matches() {
            self.set_mode()?;
            return Ok(ResourceChange::Applied);
        }

        ensure_parent(self.ops, &self.target)?;
        let record = displace(self.ops, &self.target, self.stamp)?;

        if let Err(cause) = self.ops.write(&self.target, self.content.as_bytes()) {
            // A partial write may have created the file.
            if let Err(e) = self.ops.remove(&self.target) {
                tracing::debug!(
                    "could not remove partial write at {}: {e}",
                    self.target.display()
                );
            }
            let err = match record.map(|r| backup::restore(self.ops, &r)) {
                None | Some(Ok(())) => FsError::Write {
                    path: self.target.clone(),
                    source: cause,
                },
                Some(Err(source)) => FsError::WriteNotRestored {
                    path: self.target.clone(),
                    cause,
                    source: Box::new(source),
                },
            };
            return Err(err.into());
        }

        self.set_mode()?;
        Ok(record.map_or(ResourceChange::Applied, |r| ResourceChange::Replaced {
            backup: r.backup,
        }))
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::logging::CapturedLog;
    use crate::operations::{RecordingFileSystemOps, SystemFileSystemOps};
    use std::fs;

    const STAMP: &str = "20240301_120000";

    fn resource<'a>(
        target: PathBuf,
        content: &str,
        mode: Option<u32>,
        ops: &'a dyn FileSystemOps,
    ) -> FileResource<'a> {
        FileResource::new(content.to_string(), target, mode, ops, STAMP)
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = resource(dir.path().join("f"), "x", None, &SystemFileSystemOps);
        assert_eq!(r.current_state().unwrap(), ResourceState::Missing);
    }

    #[test]
    fn identical_content_is_correct() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "hello\n").unwrap();
        let r = resource(target, "hello\n", None, &SystemFileSystemOps);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn different_content_is_incorrect() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "old").unwrap();
        let r = resource(target, "new", None, &SystemFileSystemOps);
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "content differs".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn wrong_mode_is_incorrect() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "x").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();
        let r = resource(target, "x", Some(0o600), &SystemFileSystemOps);
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "mode 644".to_string()
            }
        );
    }

    #[test]
    fn apply_writes_new_file_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/f");
        let r = resource(target.clone(), "content", None, &SystemFileSystemOps);

        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(fs::read_to_string(&target).unwrap(), "content");
    }

    #[test]
    fn apply_backs_up_differing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "old").unwrap();
        let r = resource(target.clone(), "new", None, &SystemFileSystemOps);

        let ResourceChange::Replaced { backup } = r.apply().unwrap() else {
            panic!("expected a backup");
        };
        assert_eq!(fs::read_to_string(backup).unwrap(), "old");
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn apply_with_matching_content_only_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "x").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();
        let ops = RecordingFileSystemOps::new();
        let r = resource(target.clone(), "x", Some(0o600), &ops);

        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(ops.mutations(), vec![format!("chmod {}", target.display())]);
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn apply_replaces_symlink_without_touching_destination() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = dir.path().join("elsewhere");
        fs::write(&elsewhere, "theirs").unwrap();
        let target = dir.path().join("f");
        std::os::unix::fs::symlink(&elsewhere, &target).unwrap();
        let r = resource(target.clone(), "ours", None, &SystemFileSystemOps);

        r.apply().unwrap();

        assert!(!fs::symlink_metadata(&target).unwrap().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "ours");
        assert_eq!(fs::read_to_string(&elsewhere).unwrap(), "theirs");
    }

    #[test]
    fn failed_write_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "old settings").unwrap();
        let ops = RecordingFileSystemOps::failing_writes();
        let r = resource(target.clone(), "new settings", None, &ops);

        let err = r.apply().unwrap_err();

        assert!(
            matches!(&err, EntryError::Fs(FsError::Write { path, .. }) if *path == target),
            "unexpected error: {err}"
        );
        assert_eq!(fs::read_to_string(&target).unwrap(), "old settings");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "backup should have been renamed back");
    }

    #[test]
    fn failed_write_without_original_reports_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        let ops = RecordingFileSystemOps::failing_writes();
        let r = resource(target.clone(), "new settings", None, &ops);

        let err = r.apply().unwrap_err();

        assert!(matches!(err, EntryError::Fs(FsError::Write { .. })));
        assert!(!ops.mutations().iter().any(|m| m.starts_with("rename")));
        assert!(!target.exists(), "partial write is removed");
    }

    #[test]
    fn unrestorable_write_keeps_backup_and_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        fs::write(&target, "old settings").unwrap();
        let ops = RecordingFileSystemOps::failing_writes_and_renames();
        let r = resource(target.clone(), "new settings", None, &ops);

        let err = r.apply().unwrap_err();

        let backup = dir.path().join(format!("f.backup_{STAMP}"));
        assert!(
            matches!(
                &err,
                EntryError::Fs(FsError::WriteNotRestored { source, .. })
                    if matches!(**source, FsError::Restore { .. })
            ),
            "unexpected error: {err}"
        );
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old settings");
        assert!(err.to_string().contains(&backup.display().to_string()), "{err}");
        assert!(!target.exists(), "partial write is removed");
    }

    #[test]
    fn failed_partial_write_cleanup_is_logged() {
        let captured = CapturedLog::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        let ops = RecordingFileSystemOps::refusing_writes();
        let r = resource(target.clone(), "new settings", None, &ops);

        let err = r.apply().unwrap_err();

        assert!(matches!(err, EntryError::Fs(FsError::Write { .. })));
        let contents = captured.contents();
        assert!(
            contents.contains(&format!("could not remove partial write at {}", target.display())),
            "{contents}"
        );
    }
}
