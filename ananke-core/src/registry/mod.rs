//! Hub-wide registry of course services, roles and group memberships.
//!
//! The registry is a configuration fragment loaded by the hub at startup.
//! [`RegistryStore`] reads and atomically rewrites it; [`Registry`] holds
//! the typed model and the mutations the reconciliation engine applies.

mod codec;
mod model;
mod store;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use codec::{decode, encode};
pub use model::{
    Registry, RoleRecord, SHARED_SERVICE_ROLE, ServiceRecord, ServiceSettings,
    generate_api_token,
};
pub use store::{RegistryStore, RegistryUpdate};

/// Registry file failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file exists but could not be read.
    #[error("failed to read registry {path}: {source}")]
    Read {
        /// Registry file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The new content could not be written.
    #[error("failed to write registry {path}: {source}")]
    Write {
        /// Registry file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A section does not decode into the registry model.
    #[error("registry section `{section}` is malformed: {reason}")]
    Malformed {
        /// `services`, `roles` or `groups`.
        section: &'static str,
        /// What the decoder tripped over.
        reason: String,
    },

    /// The registry lock could not be taken.
    #[error(transparent)]
    Lock(#[from] crate::fs::LockError),

    /// The registry would be written in an inconsistent state.
    #[error("registry invariant violated: {0}")]
    Invariant(String),
}

impl RegistryError {
    /// True for failures to persist, as opposed to failures to read.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, RegistryError::Write { .. })
    }
}
