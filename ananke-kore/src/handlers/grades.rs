use std::path::Path;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;

use ananke_core::lms::ScoreFailure;

use crate::application::CourseManager;
use crate::handlers::{CoursePathRequest, require_path, require_user};
use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct GradesResponse {
    pub message: String,
    pub sent: Vec<String>,
    pub failed: Vec<ScoreFailure>,
}

/// Sends every gradebook score of the course at `path` to the LMS.
///
/// Scores are posted one student at a time; a rejected score is listed in
/// `failed` and does not stop the others.
pub async fn push_grades_handler(
    State(state): State<AppState>,
    payload: Result<Json<CoursePathRequest>, JsonRejection>,
) -> AppResult<Json<GradesResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let path = require_path(&request.path)?;
    let report = CourseManager::new(&state)
        .push_grades(user, Path::new(path))
        .await?;
    let message = if report.is_complete() {
        "Grades sent successfully!"
    } else {
        "Some grades could not be sent."
    };
    Ok(Json(GradesResponse {
        message: message.to_string(),
        sent: report.sent,
        failed: report.failed,
    }))
}
