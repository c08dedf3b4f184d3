//! Static import scanning and resolution.
//!
//! The distilled project's probe `exec()`s the target file and inspects
//! `sys.modules` afterward to see what actually got imported. Re-executing
//! arbitrary source is not something a systems-language probe can do
//! generically, so this probe takes the other approach the contract allows:
//! a static regex scan for `import`/`from ... import` statements, followed
//! by filesystem resolution of each named module against a list of search
//! roots (the source tree first, then any directories named in `PYTHONPATH`).

use std::path::{Path, PathBuf};

use regex::Regex;

use makelint_util::hash;

/// A module name referenced by a plain `import foo.bar` or
/// `from foo.bar import baz` statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportedModule(pub String);

/// Scan `source` for top-level import statements and return the set of
/// distinct dotted module names they reference, sorted.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportedModule> {
    #[allow(clippy::unwrap_used)]
    let import_re = Regex::new(r"^\s*import\s+([\w][\w.]*(?:\s*,\s*[\w][\w.]*)*)").unwrap();
    #[allow(clippy::unwrap_used)]
    let from_re = Regex::new(r"^\s*from\s+([\w][\w.]*)\s+import\b").unwrap();

    let mut names: Vec<String> = Vec::new();
    for line in source.lines() {
        if let Some(caps) = import_re.captures(line) {
            if let Some(group) = caps.get(1) {
                for name in group.as_str().split(',') {
                    names.push(name.trim().to_owned());
                }
            }
        } else if let Some(caps) = from_re.captures(line) {
            if let Some(group) = caps.get(1) {
                names.push(group.as_str().to_owned());
            }
        }
    }

    names.sort();
    names.dedup();
    names.into_iter().map(ImportedModule).collect()
}

/// Where a resolved module's file lives, relative to the caller's search
/// roots.
pub enum Resolution {
    /// Resolved inside the source tree; `relative_path` is relative to it.
    Internal { relative_path: PathBuf },
    /// Resolved against some other search root; `absolute_path` is outside
    /// the source tree.
    External { absolute_path: PathBuf },
}

/// Resolve a dotted module name against `source_tree` first, then each of
/// `extra_roots` in order. Returns `None` if no root has a matching `.py`
/// file or package directory.
#[must_use]
pub fn resolve_module(
    module: &ImportedModule,
    source_tree: &Path,
    extra_roots: &[PathBuf],
) -> Option<Resolution> {
    let relative = module.0.replace('.', "/");
    let candidates = [format!("{relative}.py"), format!("{relative}/__init__.py")];

    for candidate in &candidates {
        let full = source_tree.join(candidate);
        if full.is_file() {
            return Some(Resolution::Internal {
                relative_path: PathBuf::from(candidate),
            });
        }
    }

    for root in extra_roots {
        for candidate in &candidates {
            let full = root.join(candidate);
            if full.is_file() {
                return Some(Resolution::External { absolute_path: full });
            }
        }
    }

    None
}

/// Look up the current content digest of an internal dependency, if its
/// `.sha1` sidecar exists in the mirror tree.
#[must_use]
pub fn digest_for_internal(target_tree: &Path, relative_path: &Path) -> Option<String> {
    let sidecar = target_tree.join(format!("{}.sha1", relative_path.display()));
    hash::read_digest(&sidecar).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn scans_plain_import() {
        let names = scan_imports("import os\nimport sys\n");
        assert_eq!(
            names,
            vec![ImportedModule("os".to_owned()), ImportedModule("sys".to_owned())]
        );
    }

    #[test]
    fn scans_comma_separated_import() {
        let names = scan_imports("import os, sys\n");
        assert_eq!(
            names,
            vec![ImportedModule("os".to_owned()), ImportedModule("sys".to_owned())]
        );
    }

    #[test]
    fn scans_from_import() {
        let names = scan_imports("from pkg.sub import helper\n");
        assert_eq!(names, vec![ImportedModule("pkg.sub".to_owned())]);
    }

    #[test]
    fn dedups_repeated_imports() {
        let names = scan_imports("import os\nimport os\n");
        assert_eq!(names, vec![ImportedModule("os".to_owned())]);
    }

    #[test]
    fn ignores_unrelated_lines() {
        let names = scan_imports("x = 1\n# import os\nprint('importing stuff')\n");
        assert!(names.is_empty());
    }

    #[test]
    fn resolves_internal_module_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("helper.py"), "x = 1").unwrap();

        let resolution = resolve_module(&ImportedModule("helper".to_owned()), tmp.path(), &[]);
        assert!(matches!(resolution, Some(Resolution::Internal { .. })));
    }

    #[test]
    fn resolves_internal_package_init() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        std::fs::write(tmp.path().join("pkg").join("__init__.py"), "").unwrap();

        let resolution = resolve_module(&ImportedModule("pkg".to_owned()), tmp.path(), &[]);
        let Some(Resolution::Internal { relative_path }) = resolution else {
            unreachable!("expected an internal resolution");
        };
        assert_eq!(relative_path, PathBuf::from("pkg/__init__.py"));
    }

    #[test]
    fn resolves_external_module_from_extra_root() {
        let tmp = tempfile::tempdir().unwrap();
        let source_tree = tmp.path().join("src");
        let site_packages = tmp.path().join("site-packages");
        std::fs::create_dir_all(&source_tree).unwrap();
        std::fs::create_dir_all(&site_packages).unwrap();
        std::fs::write(site_packages.join("requests.py"), "").unwrap();

        let resolution = resolve_module(
            &ImportedModule("requests".to_owned()),
            &source_tree,
            &[site_packages.clone()],
        );
        let Some(Resolution::External { absolute_path }) = resolution else {
            unreachable!("expected an external resolution");
        };
        assert_eq!(absolute_path, site_packages.join("requests.py"));
    }

    #[test]
    fn unresolvable_module_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let resolution = resolve_module(&ImportedModule("nosuchmodule".to_owned()), tmp.path(), &[]);
        assert!(resolution.is_none());
    }
}
