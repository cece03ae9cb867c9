//! Builders for the OS commands Ananke issues.

use std::path::Path;

use crate::os::CommandSpec;

const LOGIN_SHELL: &str = "--shell=/bin/bash";

/// `id -u`: succeeds only when the account exists.
pub fn account_exists(user: &str) -> CommandSpec {
    CommandSpec::new("id").args(["-u", user])
}

/// `useradd` with a bash login shell.
pub fn create_account(user: &str, create_home: bool) -> CommandSpec {
    let spec = CommandSpec::new("useradd");
    let spec = if create_home {
        spec.arg("--create-home")
    } else {
        spec
    };
    spec.args([LOGIN_SHELL, user])
}

/// Locks the password so nobody can log in as the account directly.
pub fn lock_password(user: &str) -> CommandSpec {
    CommandSpec::new("usermod").args(["-L", user])
}

/// `userdel`, keeping the home directory.
pub fn delete_account(user: &str) -> CommandSpec {
    CommandSpec::new("userdel").arg(user)
}

/// `chown -R owner path`.
pub fn chown_recursive(path: &Path, owner: &str) -> CommandSpec {
    CommandSpec::new("chown")
        .args(["-R", owner])
        .arg(path.display().to_string())
}

/// `chmod -R mode path`.
pub fn chmod_recursive(path: &Path, mode: &str) -> CommandSpec {
    CommandSpec::new("chmod")
        .args(["-R", mode])
        .arg(path.display().to_string())
}

/// `cp -r source destination`.
pub fn copy_tree(source: &Path, destination: &Path) -> CommandSpec {
    CommandSpec::new("cp")
        .arg("-r")
        .arg(source.display().to_string())
        .arg(destination.display().to_string())
}

/// `rm -rf path`.
pub fn remove_tree(path: &Path) -> CommandSpec {
    CommandSpec::new("rm")
        .arg("-rf")
        .arg(path.display().to_string())
}

/// Runs `jupyter <args>` as `user` through `runuser`.
pub fn jupyter_as<I, S>(user: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("runuser")
        .args(["-u", user, "--", "jupyter"])
        .args(args)
}

/// Runs `jupyter <args>` as root, for global lab extension state.
pub fn jupyter<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("jupyter").args(args)
}

/// Runs `jupyter <args>` inside a transient unit with the dynamic user
/// of `user`, the way the hub spawns their single-user server.
pub fn jupyter_in_dynamic_user<I, S>(user: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("systemd-run")
        .args([
            "--wait".to_string(),
            format!("--unit=post-auth-hook-{user}"),
            format!("--working-directory=/var/lib/{user}"),
            "--property=DynamicUser=yes".to_string(),
            format!("--property=StateDirectory={user}"),
            format!("--property=Environment=HOME=/var/lib/{user}"),
            "jupyter".to_string(),
        ])
        .args(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_commands() {
        assert_eq!(
            create_account("c-1", true).command_line(),
            "useradd --create-home --shell=/bin/bash c-1"
        );
        assert_eq!(
            create_account("c-1", false).command_line(),
            "useradd --shell=/bin/bash c-1"
        );
        assert_eq!(lock_password("c-1").command_line(), "usermod -L c-1");
    }

    #[test]
    fn jupyter_runs_as_grader() {
        let spec = jupyter_as("c-1", ["server", "extension", "enable", "--user"]);
        assert_eq!(
            spec.command_line(),
            "runuser -u c-1 -- jupyter server extension enable --user"
        );
    }

    #[test]
    fn dynamic_user_unit_is_named_after_user() {
        let spec = jupyter_in_dynamic_user("alice", ["labextension", "list"]);
        assert_eq!(spec.program, "systemd-run");
        assert!(spec.args.contains(&"--unit=post-auth-hook-alice".to_string()));
        assert!(
            spec.args
                .contains(&"--property=Environment=HOME=/var/lib/alice".to_string())
        );
        assert!(spec.command_line().ends_with("jupyter labextension list"));
    }
}
