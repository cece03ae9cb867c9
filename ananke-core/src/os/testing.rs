//! In-process stand-in for the OS.
//!
//! [`RecordingRunner`] records every command and simulates just enough of
//! account management (`id`, `useradd`, `userdel`) for the provisioning
//! flows to be exercised against a temp directory. `rm -rf` is carried
//! out for paths below the home root.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::os::{CommandOutput, CommandRunner, CommandSpec, OsError};

/// [`CommandRunner`] that records instead of spawning.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    accounts: Mutex<HashSet<String>>,
    failing: Vec<String>,
    home_root: Option<PathBuf>,
}

impl RecordingRunner {
    /// Runner without accounts, failures or home root.
    pub fn new() -> Self {
        Self::default()
    }

    /// `useradd --create-home` creates `<home_root>/<user>`.
    pub fn with_home_root(mut self, home_root: impl Into<PathBuf>) -> Self {
        self.home_root = Some(home_root.into());
        self
    }

    /// Commands whose command line contains `needle` exit with status 1.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing.push(needle.into());
        self
    }

    /// Starts with `user` already present.
    pub fn with_account(self, user: impl Into<String>) -> Self {
        self.lock_accounts().insert(user.into());
        self
    }

    /// True when `user` exists in the simulated account table.
    pub fn has_account(&self, user: &str) -> bool {
        self.lock_accounts().contains(user)
    }

    /// Every command seen so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// [`RecordingRunner::calls`] as command lines.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    /// Number of recorded commands whose command line contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.accounts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn simulate(&self, spec: &CommandSpec) -> CommandOutput {
        let user = spec.args.last().cloned().unwrap_or_default();
        let ok = CommandOutput {
            code: Some(0),
            ..CommandOutput::default()
        };
        let failed = |stderr: &str| CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        };

        match spec.program.as_str() {
            "id" if !self.has_account(&user) => failed("no such user"),
            "useradd" => {
                if !self.lock_accounts().insert(user.clone()) {
                    return failed("user already exists");
                }
                if spec.args.iter().any(|a| a == "--create-home")
                    && let Some(root) = &self.home_root
                    && std::fs::create_dir_all(root.join(&user)).is_err()
                {
                    return failed("cannot create home");
                }
                ok
            }
            "userdel" => {
                self.lock_accounts().remove(&user);
                ok
            }
            "rm" => {
                let target = PathBuf::from(&user);
                if let Some(root) = &self.home_root
                    && target.starts_with(root)
                {
                    let _ = if target.is_dir() {
                        std::fs::remove_dir_all(&target)
                    } else {
                        std::fs::remove_file(&target)
                    };
                }
                ok
            }
            _ => ok,
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, OsError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        let line = spec.command_line();
        if self.failing.iter().any(|needle| line.contains(needle)) {
            return Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("simulated failure: {line}"),
            });
        }
        Ok(self.simulate(spec))
    }
}
