//! Digester: maintain one content-digest sidecar per tracked source file.

use std::path::{Path, PathBuf};

use crate::discovery::read_manifest;
use crate::error::CoreError;
use crate::mirror;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use makelint_util::fs as fsutil;
use makelint_util::hash;
use makelint_util::pool::{run_bounded, Cancellation};

/// One tracked file, named by its directory-relative path and base
/// filename.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub relative_dir: PathBuf,
    pub filename: String,
}

impl TrackedFile {
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        self.relative_dir.join(&self.filename)
    }
}

/// Walk the mirror tree's manifests and collect every tracked file.
///
/// # Errors
/// Returns an error if the mirror tree cannot be read.
pub fn collect_tracked_files(target_tree: &Path) -> Result<Vec<TrackedFile>, CoreError> {
    let mut out = Vec::new();
    collect_dir(target_tree, Path::new(""), &mut out)?;
    Ok(out)
}

fn collect_dir(
    target_tree: &Path,
    relpath: &Path,
    out: &mut Vec<TrackedFile>,
) -> Result<(), CoreError> {
    let dir = mirror::mirror_dir(target_tree, relpath);
    for filename in read_manifest(&mirror::manifest_path(&dir)) {
        out.push(TrackedFile {
            relative_dir: relpath.to_path_buf(),
            filename,
        });
    }
    for subdir in fsutil::list_subdirs(&dir)? {
        let Some(name) = subdir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        collect_dir(target_tree, &relpath.join(name), out)?;
    }
    Ok(())
}

/// One stale file's source/sidecar paths, carried into the parallel pass.
struct PendingDigest {
    source_file: PathBuf,
    sidecar: PathBuf,
}

/// Ensure every tracked file has a fresh `.sha1` sidecar, dispatching stale
/// files to a bounded thread pool.
///
/// Freshness is checked in a first sequential pass (also where progress is
/// reported for every tracked file, stale or not), then every stale file is
/// hashed in one bounded `.par_iter()`-style dispatch, the same shape
/// `konvoy-engine`'s build graph uses to fan a build-graph level out across
/// threads.
///
/// # Errors
/// Returns the first error encountered by any worker, if any.
pub fn digest_sourcetree(
    source_tree: &Path,
    target_tree: &Path,
    jobs: usize,
    progress: &mut dyn ProgressSink,
) -> Result<(), CoreError> {
    let tracked = collect_tracked_files(target_tree)?;
    let total = tracked.len();
    let mut pending = Vec::new();

    for (index, file) in tracked.into_iter().enumerate() {
        progress.report(&ProgressEvent {
            phase: Phase::Digest,
            total_files: total,
            current_file: index + 1,
            ..Default::default()
        });

        let source_file = source_tree.join(file.relative_path());
        let mirror_dir = mirror::mirror_dir(target_tree, &file.relative_dir);
        let sidecar = mirror::digest_path(&mirror_dir, &file.filename);

        if sidecar.exists() && fsutil::is_newer(&sidecar, &source_file) {
            continue;
        }

        pending.push(PendingDigest { source_file, sidecar });
    }

    let cancellation = Cancellation::new();
    let errors: std::sync::Mutex<Vec<CoreError>> = std::sync::Mutex::new(Vec::new());
    run_bounded(pending, jobs, &cancellation, |item, _| {
        if let Err(error) = hash::digest_file_to_sidecar(&item.source_file, &item.sidecar) {
            #[allow(clippy::unwrap_used)]
            errors.lock().unwrap().push(error.into());
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use crate::progress::NullProgress;
    use regex::Regex;

    use super::*;

    fn setup(tmp: &tempfile::TempDir) -> (PathBuf, PathBuf) {
        let source = tmp.path().join("src");
        let target = tmp.path().join("mirror");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.py"), "print(1)").unwrap();
        fs::write(source.join("b.py"), "print(2)").unwrap();

        let include = vec![Regex::new(r"\.py$").unwrap()];
        crate::discovery::discover_sourcetree(&source, &target, &include, &[], &mut NullProgress)
            .unwrap();
        (source, target)
    }

    #[test]
    fn digests_every_tracked_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = setup(&tmp);

        digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();

        let a_digest = fs::read_to_string(target.join("a.py.sha1")).unwrap();
        assert_eq!(a_digest.trim(), hash::sha1_bytes(b"print(1)"));
        let b_digest = fs::read_to_string(target.join("b.py.sha1")).unwrap();
        assert_eq!(b_digest.trim(), hash::sha1_bytes(b"print(2)"));
    }

    #[test]
    fn second_run_is_a_no_op_for_unchanged_files() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = setup(&tmp);
        digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();

        let sidecar = target.join("a.py.sha1");
        let before = fs::metadata(&sidecar).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();
        let after = fs::metadata(&sidecar).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn content_change_triggers_redigest() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, target) = setup(&tmp);
        digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(source.join("a.py"), "print(999)").unwrap();
        digest_sourcetree(&source, &target, 2, &mut NullProgress).unwrap();

        let digest = fs::read_to_string(target.join("a.py.sha1")).unwrap();
        assert_eq!(digest.trim(), hash::sha1_bytes(b"print(999)"));
    }

    #[test]
    fn collect_tracked_files_is_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src");
        let target = tmp.path().join("mirror");
        fs::create_dir_all(source.join("pkg")).unwrap();
        fs::write(source.join("pkg").join("a.py"), "x").unwrap();
        fs::write(source.join("top.py"), "x").unwrap();

        let include = vec![Regex::new(r"\.py$").unwrap()];
        crate::discovery::discover_sourcetree(&source, &target, &include, &[], &mut NullProgress)
            .unwrap();

        let tracked = collect_tracked_files(&target).unwrap();
        let mut paths: Vec<_> = tracked.iter().map(TrackedFile::relative_path).collect();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("pkg/a.py"), PathBuf::from("top.py")]);
    }
}
