//! Process execution helpers.

use std::process::{Command, Stdio};

use crate::error::UtilError;

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not
/// found). A non-zero exit code is **not** an error; check
/// `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { source })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

/// Execute a command, writing its combined stdout+stderr to `sink` as it is
/// produced, and return its exit code.
///
/// Used by the tool runner, where a failing tool's output must land in a
/// per-file log rather than be buffered in memory and returned wholesale.
///
/// # Errors
/// Returns an error if the command cannot be spawned or `sink` cannot be
/// written.
pub fn run_command_to_sink(
    cmd: &mut Command,
    sink: &mut dyn std::io::Write,
) -> Result<Option<i32>, UtilError> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { source })?;

    sink.write_all(&output.stdout)
        .and_then(|()| sink.write_all(&output.stderr))
        .map_err(|source| UtilError::Io {
            path: "<log sink>".to_owned(),
            source,
        })?;

    Ok(output.status.code())
}
