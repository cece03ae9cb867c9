//! HTTP handlers. Request bodies name the acting hub user explicitly.

pub mod assignments;
pub mod courses;
pub mod grades;
pub mod hooks;
pub mod problems;
pub mod title;
pub mod utils;

use serde::Deserialize;

use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct CoursePathRequest {
    pub user: String,
    pub path: String,
}

pub(crate) fn require_user(user: &str) -> AppResult<&str> {
    let user = user.trim();
    if user.is_empty() {
        return Err(AppError::bad_request("`user` must not be empty"));
    }
    Ok(user)
}

pub(crate) fn require_path(path: &str) -> AppResult<&str> {
    let path = path.trim().trim_end_matches('/');
    if path.is_empty() || !path.starts_with('/') {
        return Err(AppError::bad_request("`path` must be an absolute path"));
    }
    Ok(path)
}
