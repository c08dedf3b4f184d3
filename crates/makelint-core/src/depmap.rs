//! Dependency Mapper: invoke the dependency-probe child process per stale
//! file and validate cached dependency maps against current digests.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::digest::collect_tracked_files;
use crate::error::CoreError;
use crate::mirror;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use makelint_util::depitem;
use makelint_util::hash;
use makelint_util::pool::{run_bounded, Cancellation};
use makelint_util::process::run_command;

fn mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Evaluate whether a file's cached dependency map is still valid.
///
/// See `depmap_is_uptodate` in the design notes for the full branch
/// structure this implements: the map is valid only if every listed
/// dependency is still as fresh, or as unchanged, as it was when the map was
/// produced.
#[must_use]
pub fn depmap_is_uptodate(
    dep_path: &Path,
    dep_sha1_path: &Path,
    source_tree: &Path,
    target_tree: &Path,
) -> bool {
    let (Some(dep_mtime), Some(dep_sha1_mtime)) = (mtime(dep_path), mtime(dep_sha1_path)) else {
        return false;
    };
    if dep_sha1_mtime < dep_mtime {
        return false;
    }

    let Ok(content) = std::fs::read_to_string(dep_path) else {
        return false;
    };
    let Ok(items) = depitem::from_json(&content) else {
        return false;
    };

    for item in items {
        let item_path = PathBuf::from(&item.path);
        if item_path.is_absolute() {
            let Some(item_mtime) = mtime(&item_path) else {
                return false;
            };
            if item_mtime > dep_mtime {
                return false;
            }
            continue;
        }

        let abs_source = source_tree.join(&item_path);
        let parent = item_path.parent().unwrap_or_else(|| Path::new(""));
        let Some(filename) = item_path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let sidecar = mirror::digest_path(&mirror::mirror_dir(target_tree, parent), filename);

        if !sidecar.exists() {
            let Some(src_mtime) = mtime(&abs_source) else {
                return false;
            };
            if src_mtime > dep_mtime {
                return false;
            }
            continue;
        }

        let Some(sidecar_mtime) = mtime(&sidecar) else {
            return false;
        };
        if sidecar_mtime < dep_mtime {
            continue;
        }

        let Ok(current_digest) = hash::read_digest(&sidecar) else {
            return false;
        };
        if item.digest.as_deref() != Some(current_digest.as_str()) {
            return false;
        }
    }

    true
}

/// Invoke the probe against a single file and write its `.dep`/`.dep.sha1`
/// sidecars.
///
/// # Errors
/// Returns an error if the probe cannot be spawned, exits non-zero under
/// `strict`, or either sidecar cannot be written.
pub fn map_file_dependencies(
    probe_command: &str,
    source_tree: &Path,
    target_tree: &Path,
    relative_dir: &Path,
    filename: &str,
    strict: bool,
) -> Result<(), CoreError> {
    let relative_path = relative_dir.join(filename);
    let mut cmd = Command::new(probe_command);
    cmd.arg(source_tree).arg(target_tree).arg(&relative_path);

    let output = run_command(&mut cmd).map_err(|source| CoreError::ProbeSpawn {
        probe: probe_command.to_owned(),
        message: source.to_string(),
    })?;

    if !output.success && strict {
        return Err(CoreError::ProbeFailed {
            path: relative_path.display().to_string(),
            code: output.exit_code,
        });
    }

    let mirror_dir = mirror::mirror_dir(target_tree, relative_dir);
    let dep_path = mirror::depmap_path(&mirror_dir, filename);
    std::fs::write(&dep_path, &output.stdout).map_err(|source| CoreError::Io {
        path: dep_path.display().to_string(),
        source,
    })?;

    let digest = hash::sha1_bytes(output.stdout.as_bytes());
    let dep_sha1_path = mirror::depmap_digest_path(&mirror_dir, filename);
    hash::write_digest(&dep_sha1_path, &digest)?;

    Ok(())
}

/// One stale file's identity, carried into the parallel probe dispatch.
struct PendingProbe {
    relative_dir: PathBuf,
    filename: String,
}

/// Ensure every tracked file has a fresh dependency map, dispatching stale
/// files to a bounded thread pool.
///
/// Freshness is checked in a first sequential pass (also where progress is
/// reported for every tracked file, stale or not), then every stale file is
/// probed in one bounded `.par_iter()`-style dispatch, the same shape
/// `konvoy-engine`'s build graph uses to fan a build-graph level out across
/// threads.
///
/// # Errors
/// Returns the first error encountered by any worker, if any.
pub fn map_sourcetree_dependencies(
    source_tree: &Path,
    target_tree: &Path,
    probe_command: &str,
    strict: bool,
    jobs: usize,
    progress: &mut dyn ProgressSink,
) -> Result<(), CoreError> {
    let tracked = collect_tracked_files(target_tree)?;
    let total = tracked.len();
    let mut pending = Vec::new();

    for (index, file) in tracked.into_iter().enumerate() {
        progress.report(&ProgressEvent {
            phase: Phase::DependencyMap,
            total_files: total,
            current_file: index + 1,
            ..Default::default()
        });

        let mirror_dir = mirror::mirror_dir(target_tree, &file.relative_dir);
        let dep_path = mirror::depmap_path(&mirror_dir, &file.filename);
        let dep_sha1_path = mirror::depmap_digest_path(&mirror_dir, &file.filename);

        if depmap_is_uptodate(&dep_path, &dep_sha1_path, source_tree, target_tree) {
            continue;
        }

        pending.push(PendingProbe {
            relative_dir: file.relative_dir,
            filename: file.filename,
        });
    }

    let cancellation = Cancellation::new();
    let errors: Mutex<Vec<CoreError>> = Mutex::new(Vec::new());
    run_bounded(pending, jobs, &cancellation, |item, _| {
        let result = map_file_dependencies(
            probe_command,
            source_tree,
            target_tree,
            &item.relative_dir,
            &item.filename,
            strict,
        );
        if let Err(error) = result {
            #[allow(clippy::unwrap_used)]
            errors.lock().unwrap().push(error);
            1
        } else {
            0
        }
    })?;

    #[allow(clippy::unwrap_used)]
    let mut errors = errors.lock().unwrap();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.remove(0))
    }
}
