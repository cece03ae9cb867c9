use std::path::{Path, PathBuf};
use std::time::Duration;

use ananke_config::{ConfigGuardRailError, ConfigLoadError, ConfigLoader, EnvConfig};

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ananke.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn defaults_apply_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(EnvConfig::default())
        .unwrap();
    let config = load.config;

    assert_eq!(config.server.port, 10001);
    assert_eq!(config.hub.api_url, "http://127.0.0.1:8081");
    assert_eq!(config.restart_delay(), Duration::from_secs(3));
    assert_eq!(config.enrollment_delay(), Duration::from_secs(5));
    assert_eq!(config.service_settings().base_port, 8100);
    assert_eq!(
        config.layout().instructors_file,
        PathBuf::from("/opt/kore/runtime/instructors.json")
    );
    assert_eq!(
        config.restart_command().unwrap().command_line(),
        "systemctl restart jupyterhub"
    );
    assert!(config.feedback_settings().remove_hidden);
    assert!(config.lti_platform().is_none());
    assert_eq!(config.metadata.config_path, Some(path));
    assert!(
        load.warnings
            .iter()
            .any(|w| w.message.contains("grade push is disabled"))
    );
}

#[test]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[server]
port = 9000

[paths]
runtime_dir = "/srv/kore/runtime"

[hub]
api_token = "from-file"
restart_command = ["supervisorctl", "restart", "hub"]

[lti]
issuer = "https://lms.example.org"
access_token_url = "https://lms.example.org/login/oauth2/token"
"#,
    );
    let env = EnvConfig {
        server_port: Some(9100),
        hub_api_token: Some("from-env".into()),
        ..EnvConfig::default()
    };

    let config = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(env)
        .unwrap()
        .config;

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.hub.api_token.as_deref(), Some("from-env"));
    assert_eq!(
        config.paths.instructors_file,
        PathBuf::from("/srv/kore/runtime/instructors.json")
    );
    assert_eq!(
        config.restart_command().unwrap().command_line(),
        "supervisorctl restart hub"
    );
    let platform = config.lti_platform().unwrap();
    assert_eq!(platform.issuer, "https://lms.example.org");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("nope.toml"))
        .load_from_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn unknown_sections_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[database]\nurl = 'x'\n");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn guard_rails_reject_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[paths]\nhome_root = 'home'\n");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::RelativePath {
            field: "home_root",
            ..
        })
    ));
}

#[test]
fn guard_rails_reject_empty_restart_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[hub]\nrestart_command = []\n");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::EmptyRestartCommand)
    ));
}

#[test]
fn guard_rails_reject_zero_port() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[registry]\nbase_port = 0\n");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_from_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::ZeroPort { .. })
    ));
}
