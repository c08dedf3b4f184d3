//! The wire contract between the dependency-mapper and any dependency-probe
//! child process.
//!
//! A probe writes a JSON array of [`DependencyItem`] to standard output,
//! sorted by `name`. The mapper parses it back, hashes the raw bytes for the
//! `.dep.sha1` sidecar, and later re-parses it to evaluate freshness.

use serde::{Deserialize, Serialize};

/// One entry in a file's dependency map.
///
/// `path` is either a path relative to the source tree (an internal
/// dependency — `digest` is the dependency's content digest at probe time)
/// or an absolute path (an external dependency — `digest` is always `None`,
/// since external files are not tracked by the mirror tree).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyItem {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl DependencyItem {
    /// An internal dependency: `path` is source-tree-relative and `digest`
    /// was read from its `.sha1` sidecar at probe time.
    #[must_use]
    pub fn internal(path: impl Into<String>, name: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            digest: Some(digest.into()),
        }
    }

    /// An external dependency: `path` is absolute, no digest is tracked.
    #[must_use]
    pub fn external(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            digest: None,
        }
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.digest.is_some()
    }
}

/// Serialize a list of items to the sorted-by-name JSON array format the
/// probe contract specifies.
///
/// # Errors
/// Returns an error only on a serialization bug (cyclic data cannot occur
/// here, so in practice this never fails).
pub fn to_json(mut items: Vec<DependencyItem>) -> Result<String, serde_json::Error> {
    items.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::to_string_pretty(&items)
}

/// Parse a probe's JSON output into dependency items.
///
/// # Errors
/// Returns an error if `text` is not a valid JSON array of
/// [`DependencyItem`].
pub fn from_json(text: &str) -> Result<Vec<DependencyItem>, serde_json::Error> {
    serde_json::from_str(text)
}
