use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::course::{CourseIdentity, CourseState};
use crate::lti::LaunchClaims;
use crate::provision::ProvisionReport;

/// One authenticated login as handed over by the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Launch {
    /// Hub user name.
    pub username: String,
    /// LTI claims from the hub auth state.
    pub claims: LaunchClaims,
}

impl Launch {
    /// Launch of `username` with `claims`.
    pub fn new(username: impl Into<String>, claims: LaunchClaims) -> Self {
        Self {
            username: username.into(),
            claims,
        }
    }
}

/// What one reconciliation did.
#[derive(Debug)]
pub struct LaunchOutcome {
    /// Course the launch maps onto.
    pub identity: CourseIdentity,
    /// Course state after reconciliation.
    pub state: CourseState,
    /// A registry mutation reached the disk.
    pub restart_required: bool,
    /// Present when the launch provisioned the grader account.
    pub provision: Option<ProvisionReport>,
    /// Why the registry could not be updated, if it could not.
    pub registry_error: Option<String>,
    /// Delayed hub group enrollment of a student.
    pub enrollment: Option<JoinHandle<()>>,
}

impl LaunchOutcome {
    pub(crate) fn new(identity: CourseIdentity, state: CourseState) -> Self {
        Self {
            identity,
            state,
            restart_required: false,
            provision: None,
            registry_error: None,
            enrollment: None,
        }
    }
}
