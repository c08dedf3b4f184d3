//! Orchestrator: run the full pipeline, phase after phase, for a configured
//! tree and tool set.
//!
//! Each phase runs to completion before the next begins; the ordering
//! between Discovery, Digester, Dependency Mapper and Tool Runner is the one
//! invariant the pipeline guarantees. Within a phase, files are processed by
//! a bounded worker pool with no ordering guarantee at all.

use std::sync::Arc;

use makelint_config::Configuration;
use tracing::{info, instrument};

use crate::depmap::map_sourcetree_dependencies;
use crate::digest::digest_sourcetree;
use crate::discovery::discover_sourcetree;
use crate::error::CoreError;
use crate::progress::{NullProgress, ProgressSink};
use crate::runner::{execute_tool_ontree, MergedLog, RunnerOptions};
use crate::tool::{SimpleCommand, Tool};

/// Name of the dependency-probe binary the orchestrator spawns by default.
pub const DEFAULT_PROBE_COMMAND: &str = "makelint-probe";

/// Run the full pipeline against `config`, returning the OR-accumulated
/// exit status across every configured tool (0 means every tool passed on
/// every tracked file).
///
/// # Errors
/// Returns an error if `source_tree` is unset, a phase cannot complete for a
/// reason other than a per-file tool failure, or the merged log cannot be
/// opened.
#[instrument(skip(config), fields(jobs = config.jobs, tools = config.tools.len()))]
pub fn run_pipeline(config: &Configuration) -> Result<i32, CoreError> {
    run_pipeline_with(config, DEFAULT_PROBE_COMMAND, &mut default_progress(config))
}

/// Run the full pipeline with an explicit probe command and progress sink,
/// for callers (tests, alternate front ends) that need to override either.
///
/// # Errors
/// See [`run_pipeline`].
pub fn run_pipeline_with(
    config: &Configuration,
    probe_command: &str,
    progress: &mut dyn ProgressSink,
) -> Result<i32, CoreError> {
    let source_tree = config
        .source_tree
        .clone()
        .ok_or(CoreError::MissingSourceTree)?;
    let target_tree = config.effective_target_tree()?;
    let include_patterns = config.compiled_include_patterns()?;
    let exclude_patterns = config.compiled_exclude_patterns()?;

    info!(source = %source_tree.display(), target = %target_tree.display(), "discovering source tree");
    discover_sourcetree(
        &source_tree,
        &target_tree,
        &include_patterns,
        &exclude_patterns,
        progress,
    )?;

    info!("digesting tracked files");
    digest_sourcetree(&source_tree, &target_tree, config.jobs, progress)?;

    info!(probe = probe_command, "mapping dependencies");
    map_sourcetree_dependencies(
        &source_tree,
        &target_tree,
        probe_command,
        config.strict_depprobe,
        config.jobs,
        progress,
    )?;

    let merged_log = Arc::new(MergedLog::open(config.merge_log.as_deref())?);
    let mut status = 0;

    for tool_spec in &config.tools {
        info!(tool = tool_spec.name(), "running tool");
        let tool: Arc<dyn Tool> = Arc::new(SimpleCommand::from_spec(tool_spec));
        let options = RunnerOptions {
            tool,
            env: config.env.as_ref(),
            fail_fast: config.fail_fast,
            jobs: config.jobs,
        };
        let tool_status =
            execute_tool_ontree(&source_tree, &target_tree, &merged_log, &options, progress)?;
        status |= tool_status;

        if config.fail_fast && status != 0 {
            break;
        }
    }

    Ok(status)
}

fn default_progress(config: &Configuration) -> Box<dyn ProgressSink> {
    if config.quiet {
        Box::new(NullProgress)
    } else {
        Box::new(crate::progress::LineProgress::new(std::io::stderr()))
    }
}
