//! The tool-invocation interface and the stamp-freshness test it relies on.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use makelint_config::ToolSpec;
use makelint_util::fs as fsutil;
use makelint_util::process::run_command_to_sink;

use crate::error::CoreError;

/// A lint tool the engine can run against a file.
///
/// `SimpleCommand` is the only implementation shipped here, but the trait
/// exists so an embedder can plug in a tool whose invocation does not reduce
/// to "run a binary with the file's relative path as its sole argument" —
/// the scheduler only ever talks to this interface, never to `Command`
/// directly.
pub trait Tool: Send + Sync {
    /// The tool's name, used to name its stamp and log sidecars.
    fn name(&self) -> &str;

    /// Run the tool against `relative_path` (relative to `source_tree`),
    /// with `source_tree` as the working directory and `env` as the
    /// subprocess environment (`None` means inherit the current process
    /// environment). Combined stdout+stderr is written to `sink`.
    ///
    /// # Errors
    /// Returns an error if the tool cannot be spawned or `sink` cannot be
    /// written. A non-zero exit code is not itself an error; it is
    /// represented by the returned `Option<i32>`.
    fn execute(
        &self,
        source_tree: &Path,
        relative_path: &Path,
        env: Option<&BTreeMap<String, String>>,
        sink: &mut dyn std::io::Write,
    ) -> Result<Option<i32>, CoreError>;
}

/// A tool invoked as `name [extra_args...] <relative_path>`, run with
/// `source_tree` as the working directory.
pub struct SimpleCommand {
    name: String,
    extra_args: Vec<String>,
}

impl SimpleCommand {
    #[must_use]
    pub fn new(name: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            extra_args,
        }
    }

    /// Build a `SimpleCommand` from a configured [`ToolSpec`], applying any
    /// tool-specific default arguments (e.g. `pylint`'s plain-text output
    /// format) the spec names.
    #[must_use]
    pub fn from_spec(spec: &ToolSpec) -> Self {
        Self::new(spec.name(), spec.effective_args())
    }
}

impl Tool for SimpleCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        source_tree: &Path,
        relative_path: &Path,
        env: Option<&BTreeMap<String, String>>,
        sink: &mut dyn std::io::Write,
    ) -> Result<Option<i32>, CoreError> {
        let mut cmd = Command::new(&self.name);
        cmd.args(&self.extra_args);
        cmd.arg(relative_path);
        cmd.current_dir(source_tree);
        if let Some(env) = env {
            cmd.env_clear();
            cmd.envs(env);
        }
        run_command_to_sink(&mut cmd, sink).map_err(CoreError::from)
    }
}

/// `true` if `stamp` proves `tool` has already run to completion against
/// exactly the dependency closure recorded in `dep_path`.
///
/// Two tests, either of which is sufficient: a cheap mtime comparison of the
/// stamp against the dependency-map file itself (the fast path most runs
/// take), and an authoritative byte-for-byte content comparison against the
/// dependency-map's digest sidecar for the case where the stamp is older
/// than the map but still byte-identical to the digest it was produced
/// against (e.g. after the mirror tree was restored from a backup with
/// flattened timestamps).
#[must_use]
pub fn toolstamp_is_uptodate(stamp: &Path, dep_path: &Path, dep_sha1_path: &Path) -> bool {
    if !stamp.exists() || !dep_sha1_path.exists() {
        return false;
    }
    if fsutil::is_newer(stamp, dep_path) {
        return true;
    }
    let (Ok(stamp_content), Ok(dep_sha1_content)) = (
        std::fs::read(stamp),
        std::fs::read(dep_sha1_path),
    ) else {
        return false;
    };
    stamp_content == dep_sha1_content
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn missing_stamp_is_not_uptodate() {
        let tmp = tempfile::tempdir().unwrap();
        let stamp = tmp.path().join("a.py.flake8");
        let dep = tmp.path().join("a.py.dep");
        let dep_sha1 = tmp.path().join("a.py.dep.sha1");
        fs::write(&dep, "[]").unwrap();
        fs::write(&dep_sha1, "x").unwrap();
        assert!(!toolstamp_is_uptodate(&stamp, &dep, &dep_sha1));
    }

    #[test]
    fn fresher_stamp_mtime_is_uptodate() {
        let tmp = tempfile::tempdir().unwrap();
        let dep = tmp.path().join("a.py.dep");
        let dep_sha1 = tmp.path().join("a.py.dep.sha1");
        fs::write(&dep, "[]").unwrap();
        fs::write(&dep_sha1, "digest-v1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let stamp = tmp.path().join("a.py.flake8");
        fs::write(&stamp, "digest-v1").unwrap();

        assert!(toolstamp_is_uptodate(&stamp, &dep, &dep_sha1));
    }

    #[test]
    fn stale_mtime_but_matching_content_is_uptodate() {
        let tmp = tempfile::tempdir().unwrap();
        let stamp = tmp.path().join("a.py.flake8");
        fs::write(&stamp, "digest-v1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let dep = tmp.path().join("a.py.dep");
        let dep_sha1 = tmp.path().join("a.py.dep.sha1");
        fs::write(&dep, "[]").unwrap();
        fs::write(&dep_sha1, "digest-v1").unwrap();

        assert!(toolstamp_is_uptodate(&stamp, &dep, &dep_sha1));
    }

    #[test]
    fn stale_mtime_and_mismatched_content_is_not_uptodate() {
        let tmp = tempfile::tempdir().unwrap();
        let stamp = tmp.path().join("a.py.flake8");
        fs::write(&stamp, "digest-old").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let dep = tmp.path().join("a.py.dep");
        let dep_sha1 = tmp.path().join("a.py.dep.sha1");
        fs::write(&dep, "[]").unwrap();
        fs::write(&dep_sha1, "digest-new").unwrap();

        assert!(!toolstamp_is_uptodate(&stamp, &dep, &dep_sha1));
    }

    #[test]
    fn simple_command_runs_against_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.py"), "print(1)\n").unwrap();

        let tool = SimpleCommand::new("cat", Vec::new());
        let mut out = Vec::new();
        let code = tool
            .execute(tmp.path(), Path::new("a.py"), None, &mut out)
            .unwrap();
        assert_eq!(code, Some(0));
        assert_eq!(String::from_utf8(out).unwrap(), "print(1)\n");
    }

    #[test]
    fn from_spec_builds_pylint_with_text_format() {
        let spec = makelint_config::ToolSpec::Simple("pylint".to_owned());
        let tool = SimpleCommand::from_spec(&spec);
        assert_eq!(tool.name(), "pylint");
    }
}
