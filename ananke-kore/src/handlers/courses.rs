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
    CoursePathRequest, UserQuery, UserRequest, require_path, require_user,
};
use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub message: String,
    pub names: Vec<String>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub assignments: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub message: String,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub students: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub restart_required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_steps: Vec<String>,
}

/// Lists the courses and backups the user can copy assignments from.
///
/// `names[i]` is the display name of `paths[i]`. Responds `404` when
/// nothing can be copied.
pub async fn list_courses_handler(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> AppResult<Json<CourseListResponse>> {
    let Query(query) = query?;
    let user = require_user(&query.user)?;
    let list = CourseManager::new(&state).list(user).await?;
    Ok(Json(CourseListResponse {
        message: "List of courses successfully retrieved.".to_string(),
        names: list.names,
        paths: list.paths,
    }))
}

pub async fn import_course_handler(
    State(state): State<AppState>,
    payload: Result<Json<CoursePathRequest>, JsonRejection>,
) -> AppResult<Json<ImportResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let path = require_path(&request.path)?;
    let assignments = CourseManager::new(&state)
        .import(user, Path::new(path))
        .await?;
    Ok(Json(ImportResponse {
        message: "Selected course copied successfully! Please refresh the \
                  formgrader to see the imported assignments."
            .to_string(),
        assignments,
    }))
}

pub async fn backup_course_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> AppResult<Json<BackupResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let path = CourseManager::new(&state).backup(user).await?;
    Ok(Json(BackupResponse {
        message: "Course backed up successfully!".to_string(),
        path,
    }))
}

pub async fn reset_course_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> AppResult<Json<ResetResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let report = CourseManager::new(&state).reset(user).await?;
    Ok(Json(ResetResponse {
        message: "Course reset successfully!".to_string(),
        students: report.students,
    }))
}

pub async fn delete_course_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> AppResult<Json<DeleteResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let report = CourseManager::new(&state).delete(user).await?;
    let message = if report.failed_steps.is_empty() {
        "Course deleted successfully!"
    } else {
        "Course removed from the hub; some cleanup steps failed."
    };
    Ok(Json(DeleteResponse {
        message: message.to_string(),
        restart_required: report.restart_required,
        failed_steps: report.failed_steps,
    }))
}
