//! Filesystem utilities shared by every phase of the mirror-tree cache.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Copy `src` to `dest`, preferring a hard link for speed.
///
/// Used to turn a successful tool run's dependency-map digest into its stamp
/// without re-reading and rewriting the bytes: `dest` ends up byte-identical
/// to `src`, which is exactly what `toolstamp_is_uptodate`'s authoritative
/// content comparison relies on.
///
/// Falls back to a regular copy if hard linking fails (e.g. cross-device, or
/// `dest` already exists as a distinct inode).
///
/// # Errors
/// Returns an error if both hard linking and copying fail.
pub fn materialize(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    if dest.exists() {
        std::fs::remove_file(dest).map_err(|source| UtilError::Io {
            path: dest.display().to_string(),
            source,
        })?;
    }

    if std::fs::hard_link(src, dest).is_err() {
        std::fs::copy(src, dest).map_err(|source| UtilError::Io {
            path: dest.display().to_string(),
            source,
        })?;
    }

    Ok(())
}

/// Remove a directory and all its contents. No error if the directory is
/// absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// List the immediate child directories of `dir`, sorted by file name.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// `true` if `mtime(newer) > mtime(older)`, swallowing missing-file errors as
/// `false` (a missing file can never be "newer").
pub fn is_newer(newer: &Path, older: &Path) -> bool {
    let (Ok(a), Ok(b)) = (
        newer.metadata().and_then(|m| m.modified()),
        older.metadata().and_then(|m| m.modified()),
    ) else {
        return false;
    };
    a > b
}
