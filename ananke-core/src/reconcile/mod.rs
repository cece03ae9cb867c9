//! Post-login reconciliation of course state.
//!
//! [`ReconcileEngine::reconcile`] runs once per authenticated launch. It
//! walks a course through `Unknown → Provisioned → Registered`, applies the
//! smallest registry mutation that reflects the launch and reports whether
//! the hub has to restart to see it. Only identity problems fail a launch;
//! every other step degrades to a logged, retryable failure.

mod engine;
mod outcome;

use thiserror::Error;

use crate::course::IdentityError;
use crate::error::CoreError;

pub use engine::ReconcileEngine;
pub use outcome::{Launch, LaunchOutcome};

/// Launches the engine refuses.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The claims do not name a course.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(
        "course id {course_id} is already bound to another placement \
         (deployment {deployment_id}, resource link {resource_link_id})"
    )]
    /// The course id already belongs to a different LMS placement.
    IdentityCollision {
        /// Colliding course id.
        course_id: String,
        /// Deployment recorded for the existing course.
        deployment_id: String,
        /// Resource link recorded for the existing course.
        resource_link_id: String,
    },

    /// A file the engine must read first is unusable.
    #[error(transparent)]
    Core(#[from] CoreError),
}
