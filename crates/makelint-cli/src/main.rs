#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use makelint_config::{Configuration, ToolSpec};
use tracing_subscriber::EnvFilter;

/// Incremental lint-caching build engine.
///
/// Runs a configured set of lint tools against every file in a source tree,
/// skipping files whose content and dependency closure have not changed
/// since the tool last ran against them.
#[derive(Debug, Parser)]
#[command(name = "makelint", version, about, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: (),

    /// Path to the configuration file (default: <source-tree>/.makelint.toml)
    #[arg(short = 'c', long = "config-file")]
    config_file: Option<PathBuf>,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(short = 'l', long = "log-level", default_value = "warn")]
    log_level: String,

    /// Print the effective configuration as TOML and exit without running
    #[arg(long)]
    dump_config: bool,

    /// Root directory to search for source files
    #[arg(long)]
    source_tree: Option<PathBuf>,

    /// Root directory for the mirror tree holding cache state
    #[arg(long)]
    target_tree: Option<PathBuf>,

    /// Regular expression a file's path must match to be tracked (repeatable)
    #[arg(long = "include")]
    include_patterns: Vec<String>,

    /// Regular expression that excludes a matching file or directory (repeatable)
    #[arg(long = "exclude")]
    exclude_patterns: Vec<String>,

    /// Lint tool to run, in order (repeatable; overrides the configured tool list)
    #[arg(long = "tool")]
    tools: Vec<String>,

    /// Maximum number of concurrent worker threads
    #[arg(long)]
    jobs: Option<usize>,

    /// Stop scheduling new work after the first tool failure
    #[arg(long, conflicts_with = "no_fail_fast")]
    fail_fast: bool,

    /// Override a configured fail_fast = true back to false
    #[arg(long)]
    no_fail_fast: bool,

    /// Path to append failing tool output to
    #[arg(long)]
    merge_log: Option<PathBuf>,

    /// Suppress the progress line
    #[arg(short = 'q', long, conflicts_with = "no_quiet")]
    quiet: bool,

    /// Override a configured quiet = true back to false
    #[arg(long)]
    no_quiet: bool,

    /// Treat a non-zero dependency-probe exit code as a fatal error
    #[arg(long, conflicts_with = "no_strict_depprobe")]
    strict_depprobe: bool,

    /// Override a configured strict_depprobe = true back to false
    #[arg(long)]
    no_strict_depprobe: bool,
}

/// Resolve a bare/negated flag pair into a tri-state override: `Some(true)`
/// if the bare flag was given, `Some(false)` if its `--no-*` negation was
/// given, `None` if neither was — leaving a loaded config's value alone.
fn tri_state(positive: bool, negative: bool) -> Option<bool> {
    if positive {
        Some(true)
    } else if negative {
        Some(false)
    } else {
        None
    }
}

impl Cli {
    /// Merge command-line overrides onto a loaded configuration. A CLI flag
    /// only overrides its field when it was actually given; an unset
    /// `Option` or empty repeatable leaves the config file's value alone.
    fn apply_to(&self, mut config: Configuration) -> Configuration {
        if !self.include_patterns.is_empty() {
            config.include_patterns = self.include_patterns.clone();
        }
        if !self.exclude_patterns.is_empty() {
            config.exclude_patterns = self.exclude_patterns.clone();
        }
        if let Some(source_tree) = &self.source_tree {
            config.source_tree = Some(source_tree.clone());
        }
        if let Some(target_tree) = &self.target_tree {
            config.target_tree = Some(target_tree.clone());
        }
        if !self.tools.is_empty() {
            config.tools = self.tools.iter().cloned().map(ToolSpec::Simple).collect();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(fail_fast) = tri_state(self.fail_fast, self.no_fail_fast) {
            config.fail_fast = fail_fast;
        }
        if let Some(merge_log) = &self.merge_log {
            config.merge_log = Some(merge_log.clone());
        }
        if let Some(quiet) = tri_state(self.quiet, self.no_quiet) {
            config.quiet = quiet;
        }
        if let Some(strict_depprobe) = tri_state(self.strict_depprobe, self.no_strict_depprobe) {
            config.strict_depprobe = strict_depprobe;
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config_path = cli
        .config_file
        .clone()
        .or_else(|| cli.source_tree.clone().map(|root| root.join(".makelint.toml")))
        .unwrap_or_else(|| PathBuf::from(".makelint.toml"));

    let loaded = match Configuration::load_or_default(&config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    let config = cli.apply_to(loaded);

    if cli.dump_config {
        match config.to_toml() {
            Ok(toml) => {
                println!("{toml}");
                return ExitCode::SUCCESS;
            }
            Err(error) => {
                eprintln!("error: {error}");
                return ExitCode::FAILURE;
            }
        }
    }

    match makelint_core::run_pipeline(&config) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
