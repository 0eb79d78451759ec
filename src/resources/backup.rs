//! Timestamped sibling backups of displaced targets.
//!
//! A backup of `/home/u/.vimrc` taken at 2024-03-01 12:00:00 is written to
//! `/home/u/.vimrc.backup_20240301_120000`. Backups are never deleted by this
//! tool; they are only renamed back when the step that displaced the
//! original fails.
use std::path::{Path, PathBuf};

use crate::error::FsError;
use crate::operations::FileSystemOps;

/// `strftime` format of the backup suffix.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A backup taken during the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Path that was backed up.
    pub original: PathBuf,
    /// Where the copy lives.
    pub backup: PathBuf,
}

/// Local-time stamp used for every backup taken by one run.
#[must_use]
pub fn run_stamp() -> String {
    chrono::Local::now().format(STAMP_FORMAT).to_string()
}

/// First free sibling path `<name>.backup_<stamp>[_N]` for `original`.
#[must_use]
pub fn backup_path_for(ops: &dyn FileSystemOps, original: &Path, stamp: &str) -> PathBuf {
    let name = original
        .file_name()
        .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned());
    let base = format!("{name}.backup_{stamp}");

    let mut candidate = original.with_file_name(&base);
    let mut counter = 1u32;
    while ops.lexists(&candidate) {
        candidate = original.with_file_name(format!("{base}_{counter}"));
        counter += 1;
    }
    candidate
}

/// Copy whatever is at `original` to a fresh backup path.
///
/// Returns `Ok(None)` when nothing (not even a dangling symlink) is there.
///
/// # Errors
///
/// Returns [`FsError::Backup`] if the copy fails.
pub fn backup(
    ops: &dyn FileSystemOps,
    original: &Path,
    stamp: &str,
) -> Result<Option<BackupRecord>, FsError> {
    if !ops.lexists(original) {
        return Ok(None);
    }

    let backup = backup_path_for(ops, original, stamp);
    ops.copy_tree(original, &backup)
        .map_err(|source| FsError::Backup {
            path: original.to_path_buf(),
            source,
        })?;

    Ok(Some(BackupRecord {
        original: original.to_path_buf(),
        backup,
    }))
}

/// Move a backup back to its original path.
///
/// # Errors
///
/// Returns [`FsError::RestoreBlocked`] if anything exists at the original
/// path (the backup is left untouched), or [`FsError::Restore`] if the
/// rename fails.
pub fn restore(ops: &dyn FileSystemOps, record: &BackupRecord) -> Result<(), FsError> {
    if ops.lexists(&record.original) {
        return Err(FsError::RestoreBlocked {
            original: record.original.clone(),
            backup: record.backup.clone(),
        });
    }
    ops.rename(&record.backup, &record.original)
        .map_err(|source| FsError::Restore {
            original: record.original.clone(),
            backup: record.backup.clone(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::SystemFileSystemOps;
    use std::fs;

    const STAMP: &str = "20240301_120000";

    #[test]
    fn run_stamp_has_expected_shape() {
        let stamp = run_stamp();
        assert_eq!(stamp.len(), 15, "YYYYMMDD_HHMMSS is 15 chars");
        assert_eq!(stamp.chars().nth(8), Some('_'));
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, STAMP_FORMAT).is_ok());
    }

    #[test]
    fn backup_path_is_sibling_with_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join(".vimrc");
        let path = backup_path_for(&SystemFileSystemOps, &original, STAMP);
        assert_eq!(path, dir.path().join(".vimrc.backup_20240301_120000"));
    }

    #[test]
    fn backup_path_appends_counter_when_taken() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("rc");
        fs::write(dir.path().join("rc.backup_20240301_120000"), "").unwrap();
        fs::write(dir.path().join("rc.backup_20240301_120000_1"), "").unwrap();

        let path = backup_path_for(&SystemFileSystemOps, &original, STAMP);
        assert_eq!(path, dir.path().join("rc.backup_20240301_120000_2"));
    }

    #[test]
    fn backup_of_missing_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let record = backup(&SystemFileSystemOps, &dir.path().join("nope"), STAMP).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn backup_copies_file_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("config");
        fs::write(&original, "user data").unwrap();

        let record = backup(&SystemFileSystemOps, &original, STAMP)
            .unwrap()
            .expect("record");

        assert_eq!(record.original, original);
        assert_eq!(fs::read_to_string(&record.backup).unwrap(), "user data");
        assert_eq!(fs::read_to_string(&original).unwrap(), "user data");
    }

    #[test]
    fn backup_copies_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("nvim");
        fs::create_dir_all(original.join("lua")).unwrap();
        fs::write(original.join("lua/init.lua"), "-- x").unwrap();

        let record = backup(&SystemFileSystemOps, &original, STAMP)
            .unwrap()
            .expect("record");

        assert!(record.backup.is_dir());
        assert_eq!(
            fs::read_to_string(record.backup.join("lua/init.lua")).unwrap(),
            "-- x"
        );
    }

    #[cfg(unix)]
    #[test]
    fn backup_of_dangling_symlink_is_a_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("link");
        std::os::unix::fs::symlink("/nonexistent", &original).unwrap();

        let record = backup(&SystemFileSystemOps, &original, STAMP)
            .unwrap()
            .expect("record");

        assert_eq!(
            fs::read_link(&record.backup).unwrap(),
            PathBuf::from("/nonexistent")
        );
    }

    #[test]
    fn restore_moves_backup_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("config");
        fs::write(&original, "user data").unwrap();
        let record = backup(&SystemFileSystemOps, &original, STAMP)
            .unwrap()
            .expect("record");
        fs::remove_file(&original).unwrap();

        restore(&SystemFileSystemOps, &record).unwrap();

        assert_eq!(fs::read_to_string(&original).unwrap(), "user data");
        assert!(!record.backup.exists());
    }

    #[test]
    fn restore_refuses_occupied_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("config");
        fs::write(&original, "user data").unwrap();
        let record = backup(&SystemFileSystemOps, &original, STAMP)
            .unwrap()
            .expect("record");

        let err = restore(&SystemFileSystemOps, &record).unwrap_err();

        assert!(matches!(err, FsError::RestoreBlocked { .. }));
        assert!(record.backup.exists(), "backup must be left in place");
    }
}
