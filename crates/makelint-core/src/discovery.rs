//! Discovery: walk the source tree, maintain one manifest per mirror
//! directory, and keep the mirror tree's directory structure in sync with
//! the source tree's.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::CoreError;
use crate::mirror;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use makelint_util::fs as fsutil;

/// Walk `source_tree`, writing one manifest per surviving directory into
/// `target_tree` and pruning mirror directories whose source counterpart no
/// longer exists.
///
/// Returns the number of directories visited.
///
/// # Errors
/// Returns an error on any filesystem failure; discovery does not tolerate
/// partial failures the way tool execution does.
pub fn discover_sourcetree(
    source_tree: &Path,
    target_tree: &Path,
    include_patterns: &[Regex],
    exclude_patterns: &[Regex],
    progress: &mut dyn ProgressSink,
) -> Result<usize, CoreError> {
    let mut visited = 0usize;
    discover_dir(
        source_tree,
        target_tree,
        Path::new(""),
        include_patterns,
        exclude_patterns,
        progress,
        &mut visited,
    )?;
    Ok(visited)
}

fn io_err(path: &Path, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[allow(clippy::too_many_arguments)]
fn discover_dir(
    source_tree: &Path,
    target_tree: &Path,
    relpath: &Path,
    include_patterns: &[Regex],
    exclude_patterns: &[Regex],
    progress: &mut dyn ProgressSink,
    visited: &mut usize,
) -> Result<(), CoreError> {
    let source_dir = if relpath.as_os_str().is_empty() {
        source_tree.to_path_buf()
    } else {
        source_tree.join(relpath)
    };
    let mirror = mirror::mirror_dir(target_tree, relpath);
    fsutil::ensure_dir(&mirror)?;

    *visited += 1;
    progress.report(&ProgressEvent {
        phase: Phase::Discovery,
        current_dir: *visited,
        ..Default::default()
    });

    let mut subdirs: Vec<(String, PathBuf)> = Vec::new();
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&source_dir).map_err(|e| io_err(&source_dir, e))? {
        let entry = entry.map_err(|e| io_err(&source_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let entry_relpath = relpath.join(&name);
        let file_type = entry.file_type().map_err(|e| io_err(&source_dir, e))?;
        if file_type.is_dir() {
            subdirs.push((name, entry_relpath));
        } else {
            files.push((name, entry_relpath));
        }
    }
    subdirs.sort_by(|a, b| a.0.cmp(&b.0));
    files.sort_by(|a, b| a.0.cmp(&b.0));

    // A directory is pruned from the walk (and later from the mirror tree)
    // using the directory's own relative path.
    let surviving_dirs: Vec<(String, PathBuf)> = subdirs
        .into_iter()
        .filter(|(_, rel)| !matches_any(exclude_patterns, rel))
        .collect();

    let manifest_path = mirror::manifest_path(&mirror);
    let manifest_is_fresh =
        manifest_path.exists() && fsutil::is_newer(&manifest_path, &source_dir);

    if !manifest_is_fresh {
        let mut tracked = Vec::new();
        for (name, rel) in &files {
            // Each file's own relative path is what must be checked against
            // the exclude patterns here — reusing a directory's relative
            // path from the loop above would silently exclude or admit the
            // wrong files whenever a directory and one of its files share a
            // filtering decision by coincidence rather than by design.
            let included = matches_any(include_patterns, rel);
            let excluded = matches_any(exclude_patterns, rel);
            if included && !excluded {
                tracked.push(name.clone());
            }
        }
        write_manifest(&manifest_path, &tracked)?;
    }

    let surviving_names: BTreeSet<&str> =
        surviving_dirs.iter().map(|(name, _)| name.as_str()).collect();
    for mirror_subdir in fsutil::list_subdirs(&mirror)? {
        let Some(name) = mirror_subdir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !surviving_names.contains(name) {
            fsutil::remove_dir_all_if_exists(&mirror_subdir)?;
        }
    }

    for (_, rel) in &surviving_dirs {
        discover_dir(
            source_tree,
            target_tree,
            rel,
            include_patterns,
            exclude_patterns,
            progress,
            visited,
        )?;
    }

    Ok(())
}

fn matches_any(patterns: &[Regex], path: &Path) -> bool {
    let text = path.to_string_lossy();
    patterns.iter().any(|pattern| pattern.is_match(&text))
}

fn write_manifest(path: &Path, filenames: &[String]) -> Result<(), CoreError> {
    let mut content = filenames.join("\n");
    if !filenames.is_empty() {
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| io_err(path, e))
}

/// Read a manifest's tracked filenames. A missing or malformed manifest is
/// treated as an empty one rather than a fatal error — discovery may simply
/// not have visited that directory yet on this run.
#[must_use]
pub fn read_manifest(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .map(str::to_owned)
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
