use std::path::Path;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

use crate::application::CourseManager;
use crate::handlers::{
    CoursePathRequest, UserQuery, assignments::CopyResponse,
    courses::CourseListResponse, require_path, require_user,
};
use crate::infra::{app_state::AppState, errors::AppResult};

/// Lists the notebooks of every assignment the user can copy from.
pub async fn list_problems_handler(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> AppResult<Json<CourseListResponse>> {
    let Query(query) = query?;
    let user = require_user(&query.user)?;
    let list = CourseManager::new(&state).list_problems(user).await?;
    Ok(Json(CourseListResponse {
        message: "List of problems successfully retrieved.".to_string(),
        names: list.names,
        paths: list.paths,
    }))
}

/// Copies one notebook into `source/imported/` of the current course.
pub async fn import_problem_handler(
    State(state): State<AppState>,
    payload: Result<Json<CoursePathRequest>, JsonRejection>,
) -> AppResult<Json<CopyResponse>> {
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let path = require_path(&request.path)?;
    let path = CourseManager::new(&state)
        .import_problem(user, Path::new(path))
        .await?;
    Ok(Json(CopyResponse {
        message: "Selected problem copied successfully! Please refresh the \
                  formgrader to see the imported problem."
            .to_string(),
        path,
    }))
}
