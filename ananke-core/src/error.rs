//! Crate-level error type.

use thiserror::Error;

use crate::course::IdentityError;
use crate::fs::LockError;
use crate::gradebook::GradebookError;
use crate::hub::HubError;
use crate::lms::LmsError;
use crate::os::OsError;
use crate::provision::ProvisionError;
use crate::registry::RegistryError;

/// Crate-level error wrapping the per-module error enums.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Launch claims could not be mapped onto a course.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Advisory file lock failure.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Hub registry read or write failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Gradebook database failure.
    #[error(transparent)]
    Gradebook(#[from] GradebookError),

    /// An OS command could not run or failed.
    #[error(transparent)]
    Os(#[from] OsError),

    /// Course provisioning failure.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Hub REST API failure.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// LMS grade service failure.
    #[error(transparent)]
    Lms(#[from] LmsError),

    /// A named resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A file exists but its content is unusable.
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias over [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
