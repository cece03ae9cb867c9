use std::fmt::Display;
use std::path::PathBuf;

use tokio::process::Command;

/// Abstract command representation so we can test without spawning processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable, looked up on `PATH`.
    pub program: String,
    /// Arguments, passed unquoted.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory; inherited when unset.
    pub cwd: Option<PathBuf>,
}

/// Display raw command string
impl Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(cwd) = &self.cwd {
            write!(f, "(cd {}) ", cwd.display())?;
        }
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.command_line())
    }
}

impl CommandSpec {
    /// Spec running `program` without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs the child in `cwd`.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Program and arguments joined by spaces, without env or cwd.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Builds the tokio command to spawn.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if !self.env.is_empty() {
            cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(std::process::Stdio::null());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_cwd_env_and_arguments() {
        let spec = CommandSpec::new("jupyter")
            .args(["labextension", "lock"])
            .env("HOME", "/var/lib/alice")
            .cwd("/var/lib/alice");
        assert_eq!(
            spec.to_string(),
            "(cd /var/lib/alice) HOME=/var/lib/alice jupyter labextension lock"
        );
        assert_eq!(spec.command_line(), "jupyter labextension lock");
    }
}
