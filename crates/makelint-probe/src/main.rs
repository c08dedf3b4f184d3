//! Standalone dependency-probe binary.
//!
//! Invoked by the engine's Dependency Mapper as
//! `makelint-probe <source_tree> <target_tree> <relative_path>`. Scans the
//! named file for import statements, resolves each against the source tree
//! and `PYTHONPATH`, and writes a sorted JSON dependency list to stdout. See
//! `scan.rs` for why this is a static scan rather than the dynamic
//! `sys.modules` inspection the project this cache format is modeled on
//! uses.
#![forbid(unsafe_code)]

mod scan;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use makelint_util::depitem::{self, DependencyItem};

use scan::{digest_for_internal, resolve_module, scan_imports, Resolution};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [source_tree, target_tree, relative_path] = args.as_slice() else {
        eprintln!("usage: makelint-probe <source_tree> <target_tree> <relative_path>");
        return ExitCode::FAILURE;
    };

    let source_tree = PathBuf::from(source_tree);
    let target_tree = PathBuf::from(target_tree);
    let relative_path = PathBuf::from(relative_path);
    let extra_roots = pythonpath_roots();

    let source_file = source_tree.join(&relative_path);
    let Ok(content) = std::fs::read_to_string(&source_file) else {
        // The probed file could not be read (gone, unreadable, binary).
        // Per the probe contract, emit an empty document and let the exit
        // code carry the failure for the caller to interpret.
        println!("[]");
        return ExitCode::FAILURE;
    };

    let items = probe_dependencies(&content, &source_tree, &target_tree, &extra_roots);
    match depitem::to_json(items) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(_) => {
            println!("[]");
            ExitCode::FAILURE
        }
    }
}

fn probe_dependencies(
    content: &str,
    source_tree: &Path,
    target_tree: &Path,
    extra_roots: &[PathBuf],
) -> Vec<DependencyItem> {
    let mut items = Vec::new();
    for module in scan_imports(content) {
        match resolve_module(&module, source_tree, extra_roots) {
            Some(Resolution::Internal { relative_path }) => {
                let digest = digest_for_internal(target_tree, &relative_path);
                items.push(DependencyItem {
                    path: relative_path.display().to_string(),
                    name: module.0,
                    digest,
                });
            }
            Some(Resolution::External { absolute_path }) => {
                items.push(DependencyItem::external(
                    absolute_path.display().to_string(),
                    module.0,
                ));
            }
            None => {}
        }
    }
    items
}

fn pythonpath_roots() -> Vec<PathBuf> {
    std::env::var_os("PYTHONPATH")
        .map(|raw| std::env::split_paths(&raw).collect())
        .unwrap_or_default()
}
