//! Command execution seam for the deployment pipeline.

use serde::Serialize;
use std::path::Path;
use std::process::Command;

use crate::error::CommandFailedDetails;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Capture this output as error details for `command`.
    pub fn failure_details(&self, command: &str) -> CommandFailedDetails {
        CommandFailedDetails {
            command: command.to_string(),
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// Runs external commands for the deployer, adapters and hooks.
///
/// Failure is reported through `CommandOutput::success` (exit status 0),
/// never through panics or `Err`.
pub trait CommandRunner {
    fn run_with_env(&self, command: &str, dir: &Path, env: &[(&str, &str)]) -> CommandOutput;

    fn run(&self, command: &str, dir: &Path) -> CommandOutput {
        self.run_with_env(command, dir, &[])
    }
}

/// Production runner: every command goes through `sh -c`. Pipeline commands
/// are POSIX (`mkdir -m`, `find -exec`, `tar -x`), so Windows hosts need a
/// POSIX `sh` on `PATH` (Git Bash).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run_with_env(&self, command: &str, dir: &Path, env: &[(&str, &str)]) -> CommandOutput {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd.current_dir(dir);
        cmd.envs(env.iter().copied());

        match cmd.output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
        }
    }
}
