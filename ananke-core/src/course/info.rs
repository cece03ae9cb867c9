use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::course::{CourseIdentity, hub_base_path};
use crate::error::{CoreError, Result};
use crate::fs::{OWNER_ONLY, write_atomic};
use crate::lti::LaunchClaims;

/// Per-course descriptor stored next to the gradebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    /// Course id.
    pub id: String,
    /// Long title, with the course id.
    pub title: String,
    /// Title shown in the UI.
    pub title_short: String,
    /// Grader account.
    pub grader_user: String,
    /// Hub base path, not the raw launch URI.
    pub target_link_uri: String,
    /// LTI client id the course was launched under.
    pub aud: Option<String>,
    /// Line item scores go to.
    pub lineitem: Option<String>,
    /// LTI deployment; `"0"` when the launch had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    /// Resource link the course was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link_id: Option<String>,
}

impl CourseInfo {
    /// Course record for the latest instructor launch.
    pub fn from_launch(identity: &CourseIdentity, claims: &LaunchClaims) -> Self {
        Self {
            id: identity.course_id.clone(),
            title: identity.course_title.clone(),
            title_short: identity.course_title_short.clone(),
            grader_user: identity.grader_account_id.clone(),
            target_link_uri: claims
                .target_link_uri()
                .map(hub_base_path)
                .unwrap_or_default(),
            aud: claims.audience().map(str::to_string),
            lineitem: claims.lineitem().map(str::to_string),
            deployment_id: Some(
                claims.deployment_id().unwrap_or("0").to_string(),
            ),
            resource_link_id: claims.resource_link_id().map(str::to_string),
        }
    }

    /// Reads `info.json`; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    /// Writes `info.json` atomically, readable by the owner only.
    pub fn store(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &body, Some(OWNER_ONLY))?;
        Ok(())
    }

    /// True when both descriptors name the same LMS placement.
    ///
    /// Descriptors written without placement ids never conflict.
    pub fn same_placement(&self, other: &CourseInfo) -> bool {
        match (
            (&self.deployment_id, &self.resource_link_id),
            (&other.deployment_id, &other.resource_link_id),
        ) {
            ((Some(d1), Some(r1)), (Some(d2), Some(r2))) => {
                d1 == d2 && r1 == r2
            }
            _ => true,
        }
    }
}
