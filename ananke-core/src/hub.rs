//! Client for the hub's REST API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Hub REST API failures.
#[derive(Debug, Error)]
pub enum HubError {
    /// The request did not complete.
    #[error("hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with an error status.
    #[error("hub returned {status} for {url}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Requested URL.
        url: String,
        /// Response body, for the log.
        body: String,
    },

    /// The hub has no such user.
    #[error("hub user {0} not found")]
    UnknownUser(String),
}

/// Operations Ananke needs from the hub.
///
/// `base_path` is the hub's URL prefix (`""` or `"jhub/"`).
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Adds existing hub users to `group`.
    async fn add_group_members(
        &self,
        base_path: &str,
        group: &str,
        users: &[String],
    ) -> Result<(), HubError>;

    /// Removes users from `group`.
    async fn remove_group_members(
        &self,
        base_path: &str,
        group: &str,
        users: &[String],
    ) -> Result<(), HubError>;

    /// True when `user` is a hub admin.
    async fn is_admin(&self, base_path: &str, user: &str) -> Result<bool, HubError>;
}

#[derive(Serialize)]
struct GroupMembers<'a> {
    users: &'a [String],
}

#[derive(Deserialize)]
struct HubUser {
    #[serde(default)]
    admin: bool,
}

/// `reqwest` implementation authenticating with a service token.
#[derive(Clone)]
pub struct HubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HubClient {
    /// Client for the hub API at `api_url`, authenticated with `token`.
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, HubError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Full URL of `path` below the API of the hub served at `base_path`.
    pub fn endpoint(&self, base_path: &str, path: &str) -> String {
        format!("{}/{base_path}hub/api/{path}", self.api_url)
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, HubError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        debug!(%method, url, %status, "hub api call");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%method, url, %status, "hub api call rejected");
        Err(HubError::Status {
            status,
            url: url.to_string(),
            body,
        })
    }

    async fn group_members(
        &self,
        method: Method,
        base_path: &str,
        group: &str,
        users: &[String],
    ) -> Result<(), HubError> {
        let url = self.endpoint(base_path, &format!("groups/{group}/users"));
        self.send(method, &url, Some(&GroupMembers { users })).await?;
        Ok(())
    }
}

#[async_trait]
impl HubApi for HubClient {
    async fn add_group_members(
        &self,
        base_path: &str,
        group: &str,
        users: &[String],
    ) -> Result<(), HubError> {
        self.group_members(Method::POST, base_path, group, users).await
    }

    async fn remove_group_members(
        &self,
        base_path: &str,
        group: &str,
        users: &[String],
    ) -> Result<(), HubError> {
        self.group_members(Method::DELETE, base_path, group, users).await
    }

    async fn is_admin(
        &self,
        base_path: &str,
        user: &str,
    ) -> Result<bool, HubError> {
        let url = self.endpoint(base_path, &format!("users/{user}"));
        let response = self
            .send::<()>(Method::GET, &url, None)
            .await
            .map_err(|err| match err {
                HubError::Status { status, .. }
                    if status == StatusCode::NOT_FOUND =>
                {
                    HubError::UnknownUser(user.to_string())
                }
                other => other,
            })?;
        Ok(response.json::<HubUser>().await?.admin)
    }
}
