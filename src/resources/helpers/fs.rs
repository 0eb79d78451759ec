//! File-system primitives shared by the production [`FileSystemOps`].
//!
//! [`FileSystemOps`]: crate::operations::FileSystemOps
use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;

/// Recursively copy `src` to `dst`, which must not exist yet.
///
/// Symlinks are *not* followed: a symlink anywhere in the tree (including
/// `src` itself, and including dangling links) is recreated at the
/// destination with the same link text. Regular files and directories keep
/// their permission bits and access/modification times. The copy never
/// shares inodes with the source.
///
/// # Errors
///
/// Returns the first I/O error encountered. A partially written destination
/// is left behind for the caller to inspect.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let text = fs::read_link(src)?;
        return create_symlink(&text, dst);
    }

    if file_type.is_dir() {
        fs::create_dir(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
        }
        // Permissions last so a read-only directory can still be filled.
        fs::set_permissions(dst, meta.permissions())?;
    } else {
        fs::copy(src, dst)?;
    }

    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
}

/// Remove whatever is at `path`: a file, a symlink (without touching its
/// destination), or a whole directory tree.
///
/// # Errors
///
/// Returns an error if nothing exists at `path` or removal fails.
pub fn remove_any(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else if is_dir_symlink(&meta) {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

/// On Windows, directory symlinks must be removed with `remove_dir`.
/// `symlink_metadata().is_dir()` is `false` for them, so the raw
/// `FILE_ATTRIBUTE_DIRECTORY` bit is checked instead.
#[cfg(windows)]
fn is_dir_symlink(meta: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    meta.file_type().is_symlink() && meta.file_attributes() & 0x10 != 0
}

#[cfg(not(windows))]
const fn is_dir_symlink(_meta: &fs::Metadata) -> bool {
    false
}

/// Create a symlink at `link` whose link text is `points_to`.
///
/// # Errors
///
/// Returns the OS error from the symlink call.
pub fn create_symlink(points_to: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(points_to, link)
    }

    #[cfg(windows)]
    {
        let resolved = link
            .parent()
            .map_or_else(|| points_to.to_path_buf(), |p| p.join(points_to));
        if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(points_to, link)
        } else {
            std::os::windows::fs::symlink_file(points_to, link)
        }
    }
}

/// Permission bits (`0o7777` mask) of `path`, following symlinks.
///
/// # Errors
///
/// Returns an error if `path` cannot be stat'ed, or on platforms without
/// Unix permissions.
pub fn mode(path: &Path) -> io::Result<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file modes are not supported on this platform",
        ))
    }
}

/// Set the permission bits of `path`, following symlinks.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed, or on platforms
/// without Unix permissions.
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file modes are not supported on this platform",
        ))
    }
}
