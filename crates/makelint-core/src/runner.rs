//! Tool Runner: run a configured tool against every tracked file whose
//! stamp is not fresh, merging failure output under an exclusive lock.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::digest::collect_tracked_files;
use crate::error::CoreError;
use crate::mirror::{self, FAIL_STAMP};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::tool::{toolstamp_is_uptodate, Tool};
use makelint_util::fs as fsutil;
use makelint_util::pool::{run_bounded, Cancellation};

/// A log shared by every worker running one tool phase.
///
/// Workers in this engine are OS threads within a single process, not
/// separate processes, so a `Mutex` serializes concurrent appends with the
/// same effect the distilled project gets from an OS-level `flock` across
/// forked children.
pub struct MergedLog {
    file: Option<Mutex<File>>,
}

impl MergedLog {
    /// Open (creating/truncating) the merged log at `path`, or construct a
    /// no-op log if `path` is `None`.
    ///
    /// # Errors
    /// Returns an error if `path` is given but cannot be opened for
    /// appending.
    pub fn open(path: Option<&Path>) -> Result<Self, CoreError> {
        let file = match path {
            None => None,
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| CoreError::MergedLogWrite {
                        path: path.display().to_string(),
                        source,
                    })?;
                Some(Mutex::new(file))
            }
        };
        Ok(Self { file })
    }

    /// Append a `header` line followed by `body` under an exclusive lock on
    /// the shared file handle.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn append(&self, header: &str, body: &[u8]) -> Result<(), CoreError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        #[allow(clippy::unwrap_used)]
        let mut file = file.lock().unwrap();
        writeln!(file, "=== {header} ===").map_err(|source| CoreError::MergedLogWrite {
            path: "<merged log>".to_owned(),
            source,
        })?;
        file.write_all(body)
            .map_err(|source| CoreError::MergedLogWrite {
                path: "<merged log>".to_owned(),
                source,
            })
    }
}

/// Options controlling a single tool-runner pass.
pub struct RunnerOptions<'a> {
    pub tool: Arc<dyn Tool>,
    pub env: Option<&'a BTreeMap<String, String>>,
    pub fail_fast: bool,
    pub jobs: usize,
}

/// A tracked file whose tool stamp is stale, carrying everything the
/// parallel dispatch needs once the file's own `TrackedFile` has gone out of
/// scope.
struct PendingTool {
    relative_path: PathBuf,
    dep_sha1_path: PathBuf,
    stamp_path: PathBuf,
    log_path: PathBuf,
}

/// Run `options.tool` against every tracked file, returning the
/// OR-accumulated exit status (0 means every file passed or was already
/// cached as passing).
///
/// Cached results (fresh pass or fail stamps) are resolved in a first,
/// sequential pass over every tracked file, since that is also where
/// progress is reported and where a fail-fast cached failure can stop the
/// scan outright. Every file left stale after that pass is then dispatched
/// to a bounded thread pool in one shot, the same way `konvoy-engine`
/// `.par_iter().map(...)`s over a whole build-graph level at once rather
/// than submitting one dependency at a time.
///
/// # Errors
/// Returns an error on any filesystem failure that is not a per-file tool
/// failure (those are folded into the returned status instead).
pub fn execute_tool_ontree(
    source_tree: &Path,
    target_tree: &Path,
    merged_log: &Arc<MergedLog>,
    options: &RunnerOptions<'_>,
    progress: &mut dyn ProgressSink,
) -> Result<i32, CoreError> {
    let tracked = collect_tracked_files(target_tree)?;
    let total = tracked.len();
    let mut status = 0;
    let mut pending = Vec::new();

    for (index, file) in tracked.into_iter().enumerate() {
        progress.report(&ProgressEvent {
            phase: Phase::ToolRun,
            total_files: total,
            current_file: index + 1,
            current_tool_name: Some(options.tool.name().to_owned()),
            ..Default::default()
        });

        let mirror_dir = mirror::mirror_dir(target_tree, &file.relative_dir);
        let dep_path = mirror::depmap_path(&mirror_dir, &file.filename);
        let dep_sha1_path = mirror::depmap_digest_path(&mirror_dir, &file.filename);
        let stamp_path = mirror::stamp_path(&mirror_dir, &file.filename, options.tool.name());
        let log_path = mirror::log_path(&mirror_dir, &file.filename, options.tool.name());
        let relative_path = file.relative_dir.join(&file.filename);

        if toolstamp_is_uptodate(&stamp_path, &dep_path, &dep_sha1_path) {
            let content = std::fs::read_to_string(&stamp_path).unwrap_or_default();
            if content.trim_end() == FAIL_STAMP {
                status |= 1;
                if let Ok(body) = std::fs::read(&log_path) {
                    merged_log.append(&format!("{} (cached)", relative_path.display()), &body)?;
                }
                if options.fail_fast {
                    break;
                }
            }
            continue;
        }

        let _ = std::fs::remove_file(&stamp_path);
        pending.push(PendingTool {
            relative_path,
            dep_sha1_path,
            stamp_path,
            log_path,
        });
    }

    let cancellation = Cancellation::new();
    let tool = &options.tool;
    let env = options.env;
    let fail_fast = options.fail_fast;

    let dispatch_status = run_bounded(pending, options.jobs, &cancellation, |item, cancellation| {
        let mut buffer = Vec::new();
        let exec_result = tool.execute(source_tree, &item.relative_path, env, &mut buffer);

        match exec_result {
            Ok(Some(0)) => {
                let _ = fsutil::materialize(&item.dep_sha1_path, &item.stamp_path);
                0
            }
            _ => {
                let _ = std::fs::write(&item.stamp_path, FAIL_STAMP);
                let _ = std::fs::write(&item.log_path, &buffer);
                let _ = merged_log.append(&item.relative_path.display().to_string(), &buffer);
                if fail_fast {
                    cancellation.cancel();
                }
                1
            }
        }
    })?;

    Ok(status | dispatch_status)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use regex::Regex;

    use crate::progress::NullProgress;
    use crate::tool::SimpleCommand;

    use super::*;

    fn tracked_tree(tmp: &tempfile::TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let source = tmp.path().join("src");
        let target = tmp.path().join("mirror");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.py"), "print(1)\n").unwrap();

        let include = vec![Regex::new(r"\.py$").unwrap()];
        crate::discovery::discover_sourcetree(&source, &target, &include, &[], &mut NullProgress)
            .unwrap();
        crate::digest::digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();
        crate::depmap::map_sourcetree_dependencies(&source, &target, "echo", false, 2, &mut NullProgress)
            .unwrap();
        (source, target)
    }

    #[test]
    fn passing_tool_writes_stamp_matching_dep_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = tracked_tree(&tmp);

        let merged_log = Arc::new(MergedLog::open(None).unwrap());
        let options = RunnerOptions {
            tool: Arc::new(SimpleCommand::new("true", Vec::new())),
            env: None,
            fail_fast: false,
            jobs: 2,
        };
        let status =
            execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        assert_eq!(status, 0);

        let stamp = fs::read(target.join("a.py.true")).unwrap();
        let dep_sha1 = fs::read(target.join("a.py.dep.sha1")).unwrap();
        assert_eq!(stamp, dep_sha1);
    }

    #[test]
    fn failing_tool_writes_fail_stamp_and_log() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = tracked_tree(&tmp);

        let merged_log = Arc::new(MergedLog::open(None).unwrap());
        let options = RunnerOptions {
            tool: Arc::new(SimpleCommand::new("false", Vec::new())),
            env: None,
            fail_fast: false,
            jobs: 2,
        };
        let status =
            execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        assert_eq!(status, 1);

        let stamp = fs::read_to_string(target.join("a.py.false")).unwrap();
        assert_eq!(stamp, FAIL_STAMP);
    }

    #[test]
    fn rerun_with_unchanged_inputs_does_not_rerun_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = tracked_tree(&tmp);

        let merged_log = Arc::new(MergedLog::open(None).unwrap());
        let options = RunnerOptions {
            tool: Arc::new(SimpleCommand::new("true", Vec::new())),
            env: None,
            fail_fast: false,
            jobs: 2,
        };
        execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        let stamp_path = target.join("a.py.true");
        let before = fs::metadata(&stamp_path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        let after = fs::metadata(&stamp_path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn cached_failure_replays_into_merged_log_without_rerunning() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = tracked_tree(&tmp);
        let merged_log_path = tmp.path().join("merged.log");

        {
            let merged_log = Arc::new(MergedLog::open(Some(&merged_log_path)).unwrap());
            let options = RunnerOptions {
                tool: Arc::new(SimpleCommand::new(
                    "sh",
                    vec!["-c".to_owned(), "echo boom >&2; false".to_owned()],
                )),
                env: None,
                fail_fast: false,
                jobs: 1,
            };
            execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        }

        // Second pass: stamp is fresh ("fail"), so it must replay the
        // retained log into the merged log without invoking the tool again.
        let marker = target.join("rerun-marker");
        {
            let merged_log = Arc::new(MergedLog::open(Some(&merged_log_path)).unwrap());
            let options = RunnerOptions {
                tool: Arc::new(SimpleCommand::new(
                    "sh",
                    vec![
                        "-c".to_owned(),
                        format!("touch {}; false", marker.display()),
                    ],
                )),
                env: None,
                fail_fast: false,
                jobs: 1,
            };
            let status =
                execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress)
                    .unwrap();
            assert_eq!(status, 1);
        }

        assert!(!marker.exists(), "tool must not re-run for a cached failure");
        let merged_content = fs::read_to_string(&merged_log_path).unwrap();
        assert!(merged_content.contains("(cached)"));
        assert!(merged_content.contains("boom"));
    }

    #[test]
    fn fail_fast_stops_scheduling_after_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src");
        let target = tmp.path().join("mirror");
        fs::create_dir_all(&source).unwrap();
        for name in ["a.py", "b.py", "c.py"] {
            fs::write(source.join(name), "x").unwrap();
        }
        let include = vec![Regex::new(r"\.py$").unwrap()];
        crate::discovery::discover_sourcetree(&source, &target, &include, &[], &mut NullProgress)
            .unwrap();
        crate::digest::digest_sourcetree(&source, &target, 1, &mut NullProgress).unwrap();
        crate::depmap::map_sourcetree_dependencies(&source, &target, "echo", false, 1, &mut NullProgress)
            .unwrap();

        let merged_log = Arc::new(MergedLog::open(None).unwrap());
        let options = RunnerOptions {
            tool: Arc::new(SimpleCommand::new("false", Vec::new())),
            env: None,
            fail_fast: true,
            jobs: 1,
        };
        let status =
            execute_tool_ontree(&source, &target, &merged_log, &options, &mut NullProgress).unwrap();
        assert_eq!(status, 1);
    }
}
