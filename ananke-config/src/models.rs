use std::path::PathBuf;
use std::time::Duration;

use ananke_core::Layout;
use ananke_core::lms::LtiPlatform;
use ananke_core::os::CommandSpec;
use ananke_core::provision::FeedbackSettings;
use ananke_core::registry::ServiceSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub hub: HubConfig,
    pub registry: RegistryConfig,
    pub feedback: FeedbackConfig,
    pub lti: LtiConfig,
    pub backup: BackupConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn layout(&self) -> Layout {
        let paths = &self.paths;
        Layout {
            home_root: paths.home_root.clone(),
            private_root: paths.private_root.clone(),
            runtime_dir: paths.runtime_dir.clone(),
            instructors_file: paths.instructors_file.clone(),
            registry_file: paths.registry_file.clone(),
            nbgrader_config_file: paths.nbgrader_config_file.clone(),
            exchange_root: paths.exchange_root.clone(),
            keys_dir: paths.keys_dir.clone(),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            host: self.registry.service_host.clone(),
            base_port: self.registry.base_port,
        }
    }

    pub fn feedback_settings(&self) -> FeedbackSettings {
        FeedbackSettings {
            remove_hidden: self.feedback.remove_hidden,
            remove_hidden_trace: self.feedback.remove_hidden_trace,
        }
    }

    /// `None` until both the issuer and the token endpoint are known.
    pub fn lti_platform(&self) -> Option<LtiPlatform> {
        Some(LtiPlatform {
            client_id: self.lti.client_id.clone(),
            issuer: self.lti.issuer.clone()?,
            access_token_url: self.lti.access_token_url.clone()?,
        })
    }

    pub fn restart_command(&self) -> Option<CommandSpec> {
        let (program, args) = self.hub.restart_command.split_first()?;
        Some(CommandSpec::new(program).args(args))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.hub.restart_delay_secs)
    }

    pub fn enrollment_delay(&self) -> Duration {
        Duration::from_secs(self.hub.enrollment_delay_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Filesystem locations; see [`Layout`] for what each one holds.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub home_root: PathBuf,
    pub private_root: PathBuf,
    pub runtime_dir: PathBuf,
    pub instructors_file: PathBuf,
    pub registry_file: PathBuf,
    pub nbgrader_config_file: PathBuf,
    pub exchange_root: PathBuf,
    pub keys_dir: PathBuf,
}

impl PathsConfig {
    pub fn entries(&self) -> [(&'static str, &PathBuf); 8] {
        [
            ("home_root", &self.home_root),
            ("private_root", &self.private_root),
            ("runtime_dir", &self.runtime_dir),
            ("instructors_file", &self.instructors_file),
            ("registry_file", &self.registry_file),
            ("nbgrader_config_file", &self.nbgrader_config_file),
            ("exchange_root", &self.exchange_root),
            ("keys_dir", &self.keys_dir),
        ]
    }
}

#[derive(Clone)]
pub struct HubConfig {
    pub api_url: String,
    /// Token for hub API calls; also required from the post-auth hook.
    pub api_token: Option<String>,
    pub restart_command: Vec<String>,
    pub restart_delay_secs: u64,
    pub enrollment_delay_secs: u64,
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("restart_command", &self.restart_command)
            .field("restart_delay_secs", &self.restart_delay_secs)
            .field("enrollment_delay_secs", &self.enrollment_delay_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_port: u16,
    pub service_host: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackConfig {
    pub remove_hidden: bool,
    pub remove_hidden_trace: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LtiConfig {
    pub client_id: Option<String>,
    pub issuer: Option<String>,
    pub access_token_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// `chrono` format string appended to backup and copy names.
    pub timestamp_format: String,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
