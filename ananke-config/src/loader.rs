use once_cell::sync::Lazy;
use std::{fs, path::PathBuf};
use thiserror::Error;

use crate::{
    models::{
        BackupConfig, Config, ConfigMetadata, FeedbackConfig, HubConfig,
        LtiConfig, PathsConfig, RegistryConfig, ServerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("ananke.toml"),
        PathBuf::from("config/ananke.toml"),
        PathBuf::from("/opt/kore/config/ananke.toml"),
    ]
});

const DEFAULT_PORT: u16 = 10001;
const DEFAULT_HUB_API_URL: &str = "http://127.0.0.1:8081";
const DEFAULT_RESTART_DELAY_SECS: u64 = 3;
const DEFAULT_ENROLLMENT_DELAY_SECS: u64 = 5;
const DEFAULT_BASE_PORT: u16 = 8100;
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, gathers the process environment and composes both
    /// with the configuration file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_from_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes an already gathered environment layer with the file layer.
    pub fn load_from_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| {
                ConfigLoadError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No ananke.toml detected; using defaults and environment variables",
                "Pass --config or set ANANKE_CONFIG_PATH",
            );
        }

        let FileConfig {
            server: file_server,
            paths: file_paths,
            hub: file_hub,
            registry: file_registry,
            feedback: file_feedback,
            lti: file_lti,
            backup: file_backup,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let runtime_dir = env
            .runtime_dir
            .or(file_paths.runtime_dir)
            .unwrap_or_else(|| PathBuf::from("/opt/kore/runtime"));
        let paths = PathsConfig {
            home_root: env
                .home_root
                .or(file_paths.home_root)
                .unwrap_or_else(|| PathBuf::from("/home")),
            private_root: env
                .private_root
                .or(file_paths.private_root)
                .unwrap_or_else(|| PathBuf::from("/var/lib/private")),
            instructors_file: file_paths
                .instructors_file
                .unwrap_or_else(|| runtime_dir.join("instructors.json")),
            registry_file: env
                .registry_file
                .or(file_paths.registry_file)
                .unwrap_or_else(|| {
                    PathBuf::from(
                        "/etc/jupyterhub/jupyterhub_config.d/40_courses.py",
                    )
                }),
            nbgrader_config_file: env
                .nbgrader_config_file
                .or(file_paths.nbgrader_config_file)
                .unwrap_or_else(|| {
                    PathBuf::from("/etc/jupyter/nbgrader_config.py")
                }),
            exchange_root: file_paths
                .exchange_root
                .unwrap_or_else(|| PathBuf::from("/opt/nbgrader_exchange")),
            keys_dir: env
                .keys_dir
                .or(file_paths.keys_dir)
                .unwrap_or_else(|| PathBuf::from("/opt/kore/keys")),
            runtime_dir,
        };

        let hub = HubConfig {
            api_url: env
                .hub_api_url
                .or(file_hub.api_url)
                .unwrap_or_else(|| DEFAULT_HUB_API_URL.to_string()),
            api_token: env.hub_api_token.or(file_hub.api_token),
            restart_command: env
                .restart_command
                .or(file_hub.restart_command)
                .unwrap_or_else(|| {
                    vec![
                        "systemctl".to_string(),
                        "restart".to_string(),
                        "jupyterhub".to_string(),
                    ]
                }),
            restart_delay_secs: env
                .restart_delay_secs
                .or(file_hub.restart_delay_secs)
                .unwrap_or(DEFAULT_RESTART_DELAY_SECS),
            enrollment_delay_secs: env
                .enrollment_delay_secs
                .or(file_hub.enrollment_delay_secs)
                .unwrap_or(DEFAULT_ENROLLMENT_DELAY_SECS),
        };

        let registry = RegistryConfig {
            base_port: env
                .base_port
                .or(file_registry.base_port)
                .unwrap_or(DEFAULT_BASE_PORT),
            service_host: file_registry
                .service_host
                .unwrap_or_else(|| "127.0.0.1".to_string()),
        };

        let feedback = FeedbackConfig {
            remove_hidden: file_feedback.remove_hidden.unwrap_or(true),
            remove_hidden_trace: file_feedback
                .remove_hidden_trace
                .unwrap_or(false),
        };

        let lti = LtiConfig {
            client_id: env.lti_client_id.or(file_lti.client_id),
            issuer: env.lti_issuer.or(file_lti.issuer),
            access_token_url: env
                .lti_access_token_url
                .or(file_lti.access_token_url),
        };

        let backup = BackupConfig {
            timestamp_format: file_backup
                .timestamp_format
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string()),
        };

        let config = Config {
            server,
            paths,
            hub,
            registry,
            feedback,
            lti,
            backup,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok((config, warnings))
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
