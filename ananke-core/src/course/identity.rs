use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha3::Shake256;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use thiserror::Error;
use url::Url;

use crate::lti::LaunchClaims;

const COURSE_ID_PREFIX: &str = "c-";
const COURSE_ID_DIGEST_BYTES: usize = 8;
const DEFAULT_DEPLOYMENT_ID: &str = "0";
const MAX_ACCOUNT_NAME_LEN: usize = 32;
const UNTITLED: &str = "No title available";

static ACCOUNT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_-]{0,31}$").expect("static regex")
});

/// Launches that cannot be mapped onto a course.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// No resource link id, so no course.
    #[error("launch has no resource link id")]
    MissingResourceLink,
    /// The derived grader account name is not a valid login name.
    #[error("`{0}` is not a valid account name")]
    InvalidAccountName(String),
}

/// Stable identity of one course, derived from the launch claims alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseIdentity {
    /// `c-` followed by 16 hex digits.
    pub course_id: String,
    /// Short title with the course id appended.
    pub course_title: String,
    /// `"{context} - {resource link}"`, or whichever of the two exists.
    pub course_title_short: String,
    /// Account owning the course data and running the formgrader.
    pub grader_account_id: String,
}

impl CourseIdentity {
    /// Resolves the course a launch belongs to.
    ///
    /// The course id hashes `{deployment_id}-{resource_link_id}` with
    /// SHAKE-256, so the same LMS placement always maps onto the same
    /// course and grader account.
    pub fn resolve(claims: &LaunchClaims) -> Result<Self, IdentityError> {
        let resource_link = claims
            .resource_link_id()
            .ok_or(IdentityError::MissingResourceLink)?;
        let deployment =
            claims.deployment_id().unwrap_or(DEFAULT_DEPLOYMENT_ID);

        let course_id = course_id_for(deployment, resource_link);
        let course_title_short = short_title(
            claims.context_title(),
            claims.resource_link_title(),
        );
        let course_title = strip_quotes(&format!(
            "{course_title_short} ({course_id})"
        ));
        let grader_account_id = grader_account_for(&course_id)?;

        Ok(Self {
            course_id,
            course_title,
            course_title_short: strip_quotes(&course_title_short),
            grader_account_id,
        })
    }

    /// Hub group allowed to use the formgrader.
    pub fn formgrade_group(&self) -> String {
        format!("formgrade-{}", self.course_id)
    }

    /// Hub group holding the enrolled students.
    pub fn nbgrader_group(&self) -> String {
        format!("nbgrader-{}", self.course_id)
    }

    /// Hub role granting formgrader access.
    pub fn course_role(&self) -> String {
        format!("formgrader-{}-role", self.course_id)
    }
}

/// Course id of one LMS placement.
pub fn course_id_for(deployment_id: &str, resource_link_id: &str) -> String {
    let mut hasher = Shake256::default();
    hasher.update(format!("{deployment_id}-{resource_link_id}").as_bytes());
    let mut digest = [0u8; COURSE_ID_DIGEST_BYTES];
    hasher.finalize_xof().read(&mut digest);
    format!("{COURSE_ID_PREFIX}{}", hex::encode(digest))
}

fn grader_account_for(course_id: &str) -> Result<String, IdentityError> {
    let account: String =
        course_id.chars().take(MAX_ACCOUNT_NAME_LEN).collect();
    if is_valid_account_name(&account) {
        Ok(account)
    } else {
        Err(IdentityError::InvalidAccountName(account))
    }
}

/// Matches what `useradd` accepts by default.
pub fn is_valid_account_name(name: &str) -> bool {
    ACCOUNT_NAME.is_match(name)
}

fn short_title(context: Option<&str>, resource_link: Option<&str>) -> String {
    match (context, resource_link) {
        (Some(context), Some(link)) => format!("{context} - {link}"),
        (None, Some(link)) => link.to_string(),
        (Some(context), None) => context.to_string(),
        (None, None) => UNTITLED.to_string(),
    }
}

fn strip_quotes(title: &str) -> String {
    title.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

/// Hub base path of a launch target, e.g. `https://h/jhub/lti` -> `jhub/lti/`.
///
/// Returns an empty string when the hub is served from the root.
pub fn hub_base_path(target_link_uri: &str) -> String {
    let trimmed = target_link_uri.trim_matches('/');
    let path = match Url::parse(trimmed) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => trimmed.to_string(),
    };
    let path = path.trim_matches('/');
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    }
}
