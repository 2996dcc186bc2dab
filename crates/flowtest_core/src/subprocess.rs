//! External shell commands.

use crate::error::{FlowTestError, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Runs shell commands.
pub trait CommandRunner {
    /// Runs `command` through the shell, in `dir` when given.
    ///
    /// Empty commands are no-ops. A non-zero exit is
    /// [`FlowTestError::CommandFailed`] carrying the captured stderr.
    fn run(&self, command: &str, dir: Option<&Path>) -> Result<String>;
}

/// Runs commands with `sh -c` (`cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, dir: Option<&Path>) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(String::new());
        }

        let mut cmd = shell(command);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        info!(command, "Running command");
        let output = cmd.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(FlowTestError::CommandFailed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            debug!(command, stderr = stderr.trim(), "Command wrote to stderr");
        }
        Ok(stdout)
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}
