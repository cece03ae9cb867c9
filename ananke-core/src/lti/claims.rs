use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Claim names used by the launch handling.
pub mod claim {
    /// Role URIs of the launching user.
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    /// Deployment of the tool in the LMS.
    pub const DEPLOYMENT_ID: &str =
        "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    /// Link the user clicked, with `id` and `title`.
    pub const RESOURCE_LINK: &str =
        "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    /// LMS course, with its `title`.
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    /// URL the launch was aimed at.
    pub const TARGET_LINK_URI: &str =
        "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    /// Assignment and grade services endpoint, with `lineitem`.
    pub const AGS_ENDPOINT: &str =
        "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";

    /// Membership role that makes a launch an instructor launch.
    pub const INSTRUCTOR_ROLE: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor";
}

/// Who launched, as far as Ananke cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchRole {
    /// Carries the instructor membership role.
    Instructor,
    /// Anything else.
    Student,
}

/// Immutable view over the claims of one LTI launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchClaims(Map<String, Value>);

impl LaunchClaims {
    /// Wraps an already parsed claim object.
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Accepts only a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::InvalidContent(format!(
                "launch claims must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Raw claim object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// One raw claim by full name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    fn nested_str(&self, name: &str, field: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|v| v.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Role URIs; empty when the claim is absent.
    pub fn roles(&self) -> Vec<&str> {
        self.0
            .get(claim::ROLES)
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Instructor when the instructor membership role is present.
    pub fn role(&self) -> LaunchRole {
        if self.roles().contains(&claim::INSTRUCTOR_ROLE) {
            LaunchRole::Instructor
        } else {
            LaunchRole::Student
        }
    }

    /// Shorthand for `role() == Instructor`.
    pub fn is_instructor(&self) -> bool {
        self.role() == LaunchRole::Instructor
    }

    /// `sub`, the LMS user id.
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// `given_name`, if non-empty.
    pub fn given_name(&self) -> Option<&str> {
        self.str_claim("given_name")
    }

    /// `family_name`, if non-empty.
    pub fn family_name(&self) -> Option<&str> {
        self.str_claim("family_name")
    }

    /// `email`, if non-empty.
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// Audience of the launch. Array audiences yield their first entry.
    pub fn audience(&self) -> Option<&str> {
        match self.0.get("aud")? {
            Value::String(aud) if !aud.is_empty() => Some(aud),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// Non-empty deployment id.
    pub fn deployment_id(&self) -> Option<&str> {
        self.str_claim(claim::DEPLOYMENT_ID)
    }

    /// Non-empty resource link id.
    pub fn resource_link_id(&self) -> Option<&str> {
        self.nested_str(claim::RESOURCE_LINK, "id")
    }

    /// Title of the launched resource link.
    pub fn resource_link_title(&self) -> Option<&str> {
        self.nested_str(claim::RESOURCE_LINK, "title")
    }

    /// Title of the LMS course.
    pub fn context_title(&self) -> Option<&str> {
        self.nested_str(claim::CONTEXT, "title")
    }

    /// Launch target; the hub base path is derived from it.
    pub fn target_link_uri(&self) -> Option<&str> {
        self.str_claim(claim::TARGET_LINK_URI)
    }

    /// Line item URL scores are posted to.
    pub fn lineitem(&self) -> Option<&str> {
        self.nested_str(claim::AGS_ENDPOINT, "lineitem")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
