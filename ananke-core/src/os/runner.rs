use std::fmt;
use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::os::CommandSpec;

/// Command failures.
#[derive(Debug, Error)]
pub enum OsError {
    /// The process could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted.
        command: String,
        /// Spawn error.
        #[source]
        source: io::Error,
    },

    /// The process ran and failed.
    #[error("`{command}` exited with {}: {stderr}", describe_exit(.code))]
    NonZeroExit {
        /// Command line that ran.
        command: String,
        /// Exit status; `None` when killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit status; `None` when killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes [`CommandSpec`]s.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Runs the command to completion and reports its exit status as data.
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, OsError>;

    /// Like [`CommandRunner::output`] but a non-zero exit is an error.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, OsError> {
        let output = self.output(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(OsError::NonZeroExit {
                command: spec.command_line(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Spawns real processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, OsError> {
        debug!(command = %spec, "running command");
        let output = spec.to_command().output().await.map_err(|source| {
            OsError::Spawn {
                command: spec.command_line(),
                source,
            }
        })?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            warn!(
                command = %spec.command_line(),
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "command exited unsuccessfully"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_runner_reports_exit_codes() {
        let runner = SystemRunner;
        let ok = runner.output(&CommandSpec::new("true")).await.unwrap();
        assert!(ok.success());

        let err = runner.run(&CommandSpec::new("false")).await.unwrap_err();
        assert!(matches!(err, OsError::NonZeroExit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .output(&CommandSpec::new("definitely-not-a-real-binary-4711"))
            .await
            .unwrap_err();
        assert!(matches!(err, OsError::Spawn { .. }));
    }
}
