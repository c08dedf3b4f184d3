//! The `.makelint.toml` configuration format.
//!
//! Every field here has a concrete default, mirroring the distilled
//! project's hand-written `Configuration` class: a config file only needs to
//! override the fields it disagrees with, and the CLI layer overrides
//! whatever the config file says on top of that (see `makelint-cli`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single configured lint tool.
///
/// Either a bare name (`"flake8"`) naming a simple one-argument command, or
/// a table giving a name plus extra arguments always passed ahead of the
/// target file. `pylint` is special-cased in [`ToolSpec::default_args`]
/// rather than in the tool-dispatch loop, so the special case is visible
/// next to the rest of the tool-naming logic instead of buried in the
/// scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolSpec {
    Simple(String),
    Custom {
        name: String,
        #[serde(default)]
        extra_args: Vec<String>,
    },
}

impl ToolSpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(name) | Self::Custom { name, .. } => name,
        }
    }

    /// Extra arguments that should precede the target file on the command
    /// line, after any tool-specific defaults baked in by this crate.
    #[must_use]
    pub fn effective_args(&self) -> Vec<String> {
        let mut args = Self::default_args(self.name());
        if let Self::Custom { extra_args, .. } = self {
            args.extend(extra_args.iter().cloned());
        }
        args
    }

    /// Arguments implied by a tool's name alone, matching the one special
    /// case the distilled project's `SimpleTool` carries: `pylint` must be
    /// told to use its plain-text output format, since its default is a
    /// machine-oriented format the merged log is not meant to show.
    fn default_args(name: &str) -> Vec<String> {
        if name == "pylint" {
            vec!["--output-format=text".to_owned()]
        } else {
            Vec::new()
        }
    }
}

fn default_include_patterns() -> Vec<String> {
    vec![r".*\.py$".to_owned()]
}

fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::Simple("flake8".to_owned()),
        ToolSpec::Simple("pylint".to_owned()),
    ]
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// The full, validated `.makelint.toml` configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub source_tree: Option<PathBuf>,

    #[serde(default)]
    pub target_tree: Option<PathBuf>,

    #[serde(default = "default_tools")]
    pub tools: Vec<ToolSpec>,

    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default)]
    pub merge_log: Option<PathBuf>,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Promote a non-zero dependency-probe exit code to a fatal pipeline
    /// error instead of accepting the probe's (possibly partial) output.
    #[serde(default)]
    pub strict_depprobe: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            include_patterns: default_include_patterns(),
            exclude_patterns: Vec::new(),
            source_tree: None,
            target_tree: None,
            tools: default_tools(),
            env: None,
            fail_fast: false,
            merge_log: None,
            quiet: false,
            jobs: default_jobs(),
            strict_depprobe: false,
        }
    }
}

/// Per-field help text, mirroring the distilled project's `VARDOCS`
/// convention: every configuration field gets a one-line human-readable
/// description, consumed by `--dump-config` and by the CLI's generated
/// `--help` output.
pub const FIELD_DOCS: &[(&str, &str)] = &[
    (
        "include_patterns",
        "regular expressions; a file is tracked only if its path (relative to source_tree) matches at least one",
    ),
    (
        "exclude_patterns",
        "regular expressions; a file or directory whose relative path matches any of these is never tracked",
    ),
    ("source_tree", "root directory to search for source files"),
    (
        "target_tree",
        "root directory for the mirror tree holding cache state (default: current directory)",
    ),
    (
        "tools",
        "lint tools to run against every tracked file, in order",
    ),
    (
        "env",
        "environment variables passed to tool and probe subprocesses (default: inherit the current environment)",
    ),
    ("fail_fast", "stop scheduling new work after the first tool failure"),
    (
        "merge_log",
        "path to append failing tool output to (default: none)",
    ),
    ("quiet", "suppress the progress line"),
    ("jobs", "maximum number of concurrent worker threads"),
    (
        "strict_depprobe",
        "treat a non-zero dependency-probe exit code as a fatal error instead of accepting partial output",
    ),
];

impl Configuration {
    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if `content` is not valid TOML, contains unknown
    /// keys, or has an invalid regular expression in one of the pattern
    /// lists.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the configuration at `path`, or fall back to defaults if `path`
    /// does not exist.
    ///
    /// # Errors
    /// Returns an error if `path` exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to pretty TOML, for `--dump-config`.
    ///
    /// # Errors
    /// Returns an error if serialization fails (in practice: never, since
    /// `Configuration` only contains serializable primitives).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Compile `include_patterns` into regular expressions.
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile.
    pub fn compiled_include_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        compile_all(&self.include_patterns)
    }

    /// Compile `exclude_patterns` into regular expressions.
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile.
    pub fn compiled_exclude_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        compile_all(&self.exclude_patterns)
    }

    /// The effective target tree: the configured value, or the current
    /// working directory if unset.
    ///
    /// # Errors
    /// Returns an error if `target_tree` is unset and the current working
    /// directory cannot be determined.
    pub fn effective_target_tree(&self) -> Result<PathBuf, ConfigError> {
        match &self.target_tree {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().map_err(|source| ConfigError::Io {
                path: ".".to_owned(),
                source,
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.compiled_include_patterns()?;
        self.compiled_exclude_patterns()?;
        if self.jobs == 0 {
            return Err(ConfigError::InvalidField {
                field: "jobs".to_owned(),
                message: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: source.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid .makelint.toml: {source}")]
    Parse { source: toml::de::Error },
    #[error("cannot serialize configuration: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("invalid value for `{field}`: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Configuration::default();
        assert_eq!(config.tools.len(), 2);
        assert!(!config.fail_fast);
        assert!(config.jobs >= 1);
    }

    #[test]
    fn parse_minimal_toml() {
        let config = Configuration::from_toml_str("").unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn parse_overrides_tools() {
        let toml = r#"
tools = ["flake8", { name = "pylint", extra_args = ["--disable=C0114"] }]
"#;
        let config = Configuration::from_toml_str(toml).unwrap();
        assert_eq!(config.tools.len(), 2);
        assert_eq!(config.tools[0].name(), "flake8");
        assert_eq!(config.tools[1].name(), "pylint");
        assert!(config.tools[1]
            .effective_args()
            .contains(&"--disable=C0114".to_owned()));
    }

    #[test]
    fn pylint_gets_text_output_format_by_default() {
        let spec = ToolSpec::Simple("pylint".to_owned());
        assert!(spec
            .effective_args()
            .contains(&"--output-format=text".to_owned()));
    }

    #[test]
    fn flake8_has_no_default_args() {
        let spec = ToolSpec::Simple("flake8".to_owned());
        assert!(spec.effective_args().is_empty());
    }

    #[test]
    fn reject_unknown_field() {
        let toml = "bogus = true\n";
        assert!(Configuration::from_toml_str(toml).is_err());
    }

    #[test]
    fn reject_invalid_pattern() {
        let toml = r#"exclude_patterns = ["("]"#;
        let err = Configuration::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn reject_zero_jobs() {
        let toml = "jobs = 0\n";
        assert!(Configuration::from_toml_str(toml).is_err());
    }

    #[test]
    fn load_or_default_missing_file() {
        let config = Configuration::load_or_default(Path::new("/nonexistent/.makelint.toml")).unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn round_trip() {
        let mut config = Configuration::default();
        config.fail_fast = true;
        config.jobs = 7;
        let toml = config.to_toml().unwrap();
        let reparsed = Configuration::from_toml_str(&toml).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn field_docs_cover_every_field() {
        // Every serialized field name should have a help entry.
        let config = Configuration::default();
        let toml = config.to_toml().unwrap();
        for (field, _doc) in FIELD_DOCS {
            assert!(
                toml.contains(field) || *field == "source_tree" || *field == "target_tree" || *field == "merge_log" || *field == "env",
                "missing field in sample output: {field}"
            );
        }
    }

    #[test]
    fn effective_target_tree_defaults_to_cwd() {
        let config = Configuration::default();
        let resolved = config.effective_target_tree().unwrap();
        assert_eq!(resolved, std::env::current_dir().unwrap());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            #[allow(clippy::unwrap_used)]
            fn jobs_round_trips(jobs in 1usize..64) {
                let mut config = Configuration::default();
                config.jobs = jobs;
                let toml = config.to_toml().unwrap();
                let reparsed = Configuration::from_toml_str(&toml).unwrap();
                prop_assert_eq!(reparsed.jobs, jobs);
            }
        }
    }
}
