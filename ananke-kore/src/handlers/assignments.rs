use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Serialize;

use crate::application::CourseManager;
use crate::handlers::{
    CoursePathRequest, UserQuery, courses::CourseListResponse, require_path,
    require_user,
};
use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub message: String,
    pub path: PathBuf,
}

/// Lists single assignments of every active course and backup the user
/// can copy from. Responds `404` when there are none.
pub async fn list_assignments_handler(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> AppResult<Json<CourseListResponse>> {
    let Query(query) = query?;
    let user = require_user(&query.user)?;
    let list = CourseManager::new(&state).list_assignments(user).await?;
    Ok(Json(CourseListResponse {
        message: "List of assignments successfully retrieved.".to_string(),
        names: list.names,
        paths: list.paths,
    }))
}

pub async fn import_assignment_handler(
    State(state): State<AppState>,
    payload: Result<Json<CoursePathRequest>, JsonRejection>,
) -> AppResult<Json<CopyResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let path = require_path(&request.path)?;
    let path = CourseManager::new(&state)
        .import_assignment(user, Path::new(path))
        .await?;
    Ok(Json(CopyResponse {
        message: "Selected assignment copied successfully! Please refresh \
                  the formgrader to see the imported assignment."
            .to_string(),
        path,
    }))
}
