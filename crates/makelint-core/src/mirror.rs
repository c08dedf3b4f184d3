//! Naming conventions and path mapping for the mirror tree.
//!
//! The mirror tree (`target_tree`) holds every piece of persistent cache
//! state as a structural copy of `source_tree`: one mirror directory per
//! source directory, and one sidecar file per tracked source file per kind
//! of cached fact.

use std::path::{Path, PathBuf};

/// Name of the per-directory manifest listing tracked base filenames.
pub const MANIFEST_FILENAME: &str = "manifest.txt";

/// Suffix of a content-digest sidecar.
pub const DIGEST_SUFFIX: &str = "sha1";

/// Suffix of a dependency-map sidecar.
pub const DEPMAP_SUFFIX: &str = "dep";

/// Suffix of a dependency-map digest sidecar.
pub const DEPMAP_DIGEST_SUFFIX: &str = "dep.sha1";

/// Content written to a tool stamp when the tool failed.
pub const FAIL_STAMP: &str = "fail";

/// Compute the path relative to `root`, treating `root` itself as `""`.
///
/// # Errors
/// Returns `None` if `path` is not inside `root`.
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Map a source-tree-relative path onto the corresponding mirror directory.
pub fn mirror_dir(target_tree: &Path, relative_dir: &Path) -> PathBuf {
    if relative_dir.as_os_str().is_empty() {
        target_tree.to_path_buf()
    } else {
        target_tree.join(relative_dir)
    }
}

/// Path to the manifest for a mirror directory.
pub fn manifest_path(mirror_dir: &Path) -> PathBuf {
    mirror_dir.join(MANIFEST_FILENAME)
}

/// Path to a file's content-digest sidecar.
pub fn digest_path(mirror_dir: &Path, filename: &str) -> PathBuf {
    mirror_dir.join(format!("{filename}.{DIGEST_SUFFIX}"))
}

/// Path to a file's dependency-map sidecar.
pub fn depmap_path(mirror_dir: &Path, filename: &str) -> PathBuf {
    mirror_dir.join(format!("{filename}.{DEPMAP_SUFFIX}"))
}

/// Path to a file's dependency-map digest sidecar.
pub fn depmap_digest_path(mirror_dir: &Path, filename: &str) -> PathBuf {
    mirror_dir.join(format!("{filename}.{DEPMAP_DIGEST_SUFFIX}"))
}

/// Path to a file's stamp sidecar for the named tool.
pub fn stamp_path(mirror_dir: &Path, filename: &str, tool_name: &str) -> PathBuf {
    mirror_dir.join(format!("{filename}.{tool_name}"))
}

/// Path to a file's log sidecar for the named tool.
pub fn log_path(mirror_dir: &Path, filename: &str, tool_name: &str) -> PathBuf {
    mirror_dir.join(format!("{filename}.{tool_name}.log"))
}
