use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub paths: FilePathsConfig,
    #[serde(default)]
    pub hub: FileHubConfig,
    #[serde(default)]
    pub registry: FileRegistryConfig,
    #[serde(default)]
    pub feedback: FileFeedbackConfig,
    #[serde(default)]
    pub lti: FileLtiConfig,
    #[serde(default)]
    pub backup: FileBackupConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructors_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbgrader_config_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHubConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRegistryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_host: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFeedbackConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_hidden_trace: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLtiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileBackupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_format: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub home_root: Option<PathBuf>,
    pub private_root: Option<PathBuf>,
    pub runtime_dir: Option<PathBuf>,
    pub registry_file: Option<PathBuf>,
    pub nbgrader_config_file: Option<PathBuf>,
    pub keys_dir: Option<PathBuf>,
    pub hub_api_url: Option<String>,
    pub hub_api_token: Option<String>,
    pub restart_command: Option<Vec<String>>,
    pub restart_delay_secs: Option<u64>,
    pub enrollment_delay_secs: Option<u64>,
    pub base_port: Option<u16>,
    pub lti_client_id: Option<String>,
    pub lti_issuer: Option<String>,
    pub lti_access_token_url: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment layer from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let path = |name: &str| var(name).map(PathBuf::from);
        let number = |name: &str| var(name).and_then(|s| s.trim().parse().ok());

        Self {
            config_path: path("ANANKE_CONFIG_PATH"),
            server_host: var("ANANKE_HOST"),
            server_port: var("ANANKE_PORT").and_then(|s| s.parse().ok()),
            home_root: path("ANANKE_HOME_ROOT"),
            private_root: path("ANANKE_PRIVATE_ROOT"),
            runtime_dir: path("ANANKE_RUNTIME_DIR"),
            registry_file: path("ANANKE_REGISTRY_FILE"),
            nbgrader_config_file: path("ANANKE_NBGRADER_CONFIG_FILE"),
            keys_dir: path("ANANKE_KEYS_DIR"),
            hub_api_url: var("JUPYTERHUB_API_URL"),
            hub_api_token: var("JUPYTERHUB_API_TOKEN"),
            restart_command: var("ANANKE_RESTART_COMMAND").map(|raw| {
                raw.split_whitespace().map(str::to_string).collect()
            }),
            restart_delay_secs: number("ANANKE_RESTART_DELAY_SECS"),
            enrollment_delay_secs: number("ANANKE_ENROLLMENT_DELAY_SECS"),
            base_port: var("ANANKE_BASE_PORT").and_then(|s| s.parse().ok()),
            lti_client_id: var("LTI_CLIENT_ID"),
            lti_issuer: var("LTI_ISSUER"),
            lti_access_token_url: var("LTI_ACCESS_TOKEN_URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_variables_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("ANANKE_PORT", "10002"),
            ("JUPYTERHUB_API_TOKEN", "  "),
            ("ANANKE_RESTART_COMMAND", "supervisorctl restart hub"),
        ]
        .into_iter()
        .collect();

        let env = EnvConfig::from_lookup(|name| {
            vars.get(name).map(|v| v.to_string())
        });

        assert_eq!(env.server_port, Some(10002));
        assert_eq!(env.hub_api_token, None);
        assert_eq!(
            env.restart_command,
            Some(vec![
                "supervisorctl".to_string(),
                "restart".to_string(),
                "hub".to_string()
            ])
        );
    }
}
