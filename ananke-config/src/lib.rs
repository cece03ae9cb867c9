//! Configuration for the Ananke services.
//!
//! Values are layered: a TOML file (explicit path, `ANANKE_CONFIG_PATH` or
//! one of the default locations) is overridden by environment variables,
//! optionally seeded from a `.env` file. [`ConfigLoader::load`] composes
//! the layers, applies guard rails and returns the resulting [`Config`]
//! together with non-fatal [`ConfigWarnings`].

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    BackupConfig, Config, ConfigMetadata, FeedbackConfig, HubConfig, LtiConfig,
    PathsConfig, RegistryConfig, ServerConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
