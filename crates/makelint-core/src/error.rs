//! Error types for makelint-core.

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] makelint_util::error::UtilError),

    /// A configuration operation failed.
    #[error("{0}")]
    Config(#[from] makelint_config::ConfigError),

    /// An exclude or include pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The dependency-probe child process could not be spawned.
    #[error("cannot run dependency probe `{probe}`: {message}")]
    ProbeSpawn { probe: String, message: String },

    /// The dependency-probe child exited non-zero under `strict_depprobe`.
    #[error("dependency probe exited with status {code:?} while probing {path}")]
    ProbeFailed { path: String, code: Option<i32> },

    /// The merged log could not be written.
    #[error("cannot write merged log {path}: {source}")]
    MergedLogWrite {
        path: String,
        source: std::io::Error,
    },

    /// `source_tree` was not configured and could not be inferred.
    #[error("source_tree is not configured")]
    MissingSourceTree,
}
