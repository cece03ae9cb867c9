use thiserror::Error;
use url::Url;

use crate::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must not be 0")]
    ZeroPort { field: &'static str },
    #[error("path {field} must be absolute, got {value}")]
    RelativePath { field: &'static str, value: String },
    #[error("hub restart command is empty")]
    EmptyRestartCommand,
    #[error("invalid URL in {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("backup timestamp format must not be empty")]
    EmptyTimestampFormat,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.server.port == 0 {
        return Err(ConfigGuardRailError::ZeroPort {
            field: "server.port",
        });
    }
    if config.registry.base_port == 0 {
        return Err(ConfigGuardRailError::ZeroPort {
            field: "registry.base_port",
        });
    }

    for (field, path) in config.paths.entries() {
        if !path.is_absolute() {
            return Err(ConfigGuardRailError::RelativePath {
                field,
                value: path.display().to_string(),
            });
        }
    }

    if config.hub.restart_command.is_empty() {
        return Err(ConfigGuardRailError::EmptyRestartCommand);
    }
    if config.backup.timestamp_format.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyTimestampFormat);
    }

    check_url("hub.api_url", Some(&config.hub.api_url))?;
    check_url("lti.access_token_url", config.lti.access_token_url.as_deref())?;

    if config.hub.api_token.is_none() {
        warnings.push_with_hint(
            "No hub API token configured; the post-auth hook rejects every call and hub API requests are unauthenticated",
            "Set JUPYTERHUB_API_TOKEN or hub.api_token",
        );
    }

    if config.lti_platform().is_none() {
        warnings.push_with_hint(
            "LTI issuer or access token URL missing; grade push is disabled",
            "Set lti.issuer and lti.access_token_url",
        );
    }

    if config.hub.restart_delay_secs == 0 {
        warnings.push(
            "Hub restart delay is 0; the response that triggered a restart may be cut off",
        );
    }

    Ok(warnings)
}

fn check_url(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), ConfigGuardRailError> {
    match value {
        None => Ok(()),
        Some(raw) => Url::parse(raw).map(|_| ()).map_err(|err| {
            ConfigGuardRailError::InvalidUrl {
                field,
                reason: err.to_string(),
            }
        }),
    }
}
