//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that reconciliation can be
//! exercised against a wrapper that counts mutations or injects failures.
//! Production code uses [`SystemFileSystemOps`].

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use crate::resources::helpers::fs as helpers;

/// Abstraction over the filesystem queries and mutations used by resources.
///
/// Every mutation the tool performs goes through one of the methods below,
/// which makes "a second run performs zero writes" observable from tests.
pub trait FileSystemOps: Send + Sync + Debug {
    /// Returns `true` if `path` exists, following symlinks.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` itself is a symlink (dangling or not).
    fn is_symlink(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a real directory (not a symlink to one).
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if anything at all is at `path`, including a dangling
    /// symlink.
    fn lexists(&self, path: &Path) -> bool {
        self.is_symlink(path) || self.exists(path)
    }

    /// Read the link text of the symlink at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a symlink or cannot be read.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Read the contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Permission bits of `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be stat'ed.
    fn mode(&self, path: &Path) -> io::Result<u32>;

    /// Create `path` and all missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a symlink at `link` pointing at `points_to`.
    ///
    /// # Errors
    ///
    /// Returns the OS error from the symlink call.
    fn symlink(&self, points_to: &Path, link: &Path) -> io::Result<()>;

    /// Remove a file, a symlink, or a whole directory tree.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Rename `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy `from` to the new path `to`, preserving symlinks, permissions
    /// and modification times.
    ///
    /// # Errors
    ///
    /// Returns an error if any part of the copy fails.
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Set the permission bits of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the permissions cannot be changed.
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Write `content` to `path`, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn is_dir(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        helpers::mode(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn symlink(&self, points_to: &Path, link: &Path) -> io::Result<()> {
        helpers::create_symlink(points_to, link)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        helpers::remove_any(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        helpers::copy_tree(from, to)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        helpers::set_mode(path, mode)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        std::fs::write(path, content)
    }
}

/// Failure injected by [`RecordingFileSystemOps`].
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Fault {
    #[default]
    None,
    /// `symlink` fails with `PermissionDenied`.
    Symlink,
    /// `symlink` leaves a regular file at the link path, then fails.
    SymlinkOccupied,
    /// `write` fails without touching the disk.
    WriteRefused,
    /// `write` leaves half the content behind, then fails.
    Write,
    /// Like `Write`, and every `rename` fails too.
    WriteAndRename,
}

/// Test wrapper around [`SystemFileSystemOps`] that records every mutation
/// and can inject symlink, write or rename failures.
///
/// Queries pass straight through to the real filesystem.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingFileSystemOps {
    mutations: std::sync::Mutex<Vec<String>>,
    fault: Fault,
}

#[cfg(test)]
impl RecordingFileSystemOps {
    /// Create a wrapper that records but never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn with_fault(fault: Fault) -> Self {
        Self {
            mutations: std::sync::Mutex::new(Vec::new()),
            fault,
        }
    }

    /// Create a wrapper whose `symlink` always fails with `PermissionDenied`.
    #[must_use]
    pub const fn denying_symlinks() -> Self {
        Self::with_fault(Fault::Symlink)
    }

    /// Create a wrapper whose `symlink` writes a regular file at the link
    /// path before failing, so nothing can be moved back there.
    #[must_use]
    pub const fn occupying_failed_symlinks() -> Self {
        Self::with_fault(Fault::SymlinkOccupied)
    }

    /// Create a wrapper whose `write` stores the first half of the content
    /// and then fails.
    #[must_use]
    pub const fn failing_writes() -> Self {
        Self::with_fault(Fault::Write)
    }

    /// Create a wrapper whose `write` fails before creating anything.
    #[must_use]
    pub const fn refusing_writes() -> Self {
        Self::with_fault(Fault::WriteRefused)
    }

    /// Like [`failing_writes`](Self::failing_writes), and `rename` always
    /// fails as well.
    #[must_use]
    pub const fn failing_writes_and_renames() -> Self {
        Self::with_fault(Fault::WriteAndRename)
    }

    /// All mutations recorded so far, as `"<op> <path>"` strings.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.mutations
            .lock()
            .map_or_else(|_| Vec::new(), |g| g.clone())
    }

    fn record(&self, op: &str, path: &Path) {
        if let Ok(mut guard) = self.mutations.lock() {
            guard.push(format!("{op} {}", path.display()));
        }
    }
}

#[cfg(test)]
impl FileSystemOps for RecordingFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_symlink(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_dir(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        SystemFileSystemOps.read_link(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        SystemFileSystemOps.read(path)
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        SystemFileSystemOps.mode(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record("mkdir", path);
        SystemFileSystemOps.create_dir_all(path)
    }

    fn symlink(&self, points_to: &Path, link: &Path) -> io::Result<()> {
        self.record("symlink", link);
        match self.fault {
            Fault::Symlink => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied (injected)",
            )),
            Fault::SymlinkOccupied => {
                SystemFileSystemOps.write(link, b"occupied")?;
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "file exists (injected)",
                ))
            }
            _ => SystemFileSystemOps.symlink(points_to, link),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.record("remove", path);
        SystemFileSystemOps.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("rename", from);
        if self.fault == Fault::WriteAndRename {
            return Err(io::Error::other("rename refused (injected)"));
        }
        SystemFileSystemOps.rename(from, to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("copy", from);
        SystemFileSystemOps.copy_tree(from, to)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.record("chmod", path);
        SystemFileSystemOps.set_mode(path, mode)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.record("write", path);
        if self.fault == Fault::WriteRefused {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only file system (injected)",
            ));
        }
        if matches!(self.fault, Fault::Write | Fault::WriteAndRename) {
            let partial = content.get(..content.len() / 2).unwrap_or_default();
            SystemFileSystemOps.write(path, partial)?;
            return Err(io::Error::other("no space left on device (injected)"));
        }
        SystemFileSystemOps.write(path, content)
    }
}
