//! Score push to the LMS through LTI Advantage grade services.
//!
//! Kore signs a client assertion with the tool key, trades it for an
//! access token at the platform and posts one score per gradebook row to
//! the course's line item.

mod keys;
mod publisher;

use std::path::PathBuf;

use thiserror::Error;

pub use keys::{ToolKeys, load_public_jwk};
pub use publisher::{
    GradePublisher, LtiPlatform, PushReport, ScoreFailure, score_url,
};

/// Grade push failures.
#[derive(Debug, Error)]
pub enum LmsError {
    /// A key file could not be read.
    #[error("failed to read key {path}: {source}")]
    KeyFile {
        /// Key file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The key material does not parse.
    #[error("invalid key material: {0}")]
    Key(String),

    /// The client assertion could not be signed.
    #[error("failed to sign client assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// A request to the LMS did not complete or was refused.
    #[error("LMS request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No access token was issued.
    #[error("LMS token endpoint rejected the assertion: {0}")]
    AccessToken(String),

    /// The course has no line item or it is not a URL.
    #[error("course has no usable line item: {0}")]
    LineItem(String),

    /// Neither the course nor the configuration names a client id.
    #[error("course has no LMS audience")]
    MissingAudience,
}
