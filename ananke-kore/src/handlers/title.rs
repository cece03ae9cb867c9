use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Serialize;

use crate::application::CourseManager;
use crate::handlers::{UserQuery, require_user};
use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub message: String,
    pub title: String,
}

/// Short title of the user's current course.
pub async fn title_handler(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> AppResult<Json<TitleResponse>> {
    let Query(query) = query?;
    let user = require_user(&query.user)?;
    let title = CourseManager::new(&state).title(user)?;
    Ok(Json(TitleResponse {
        message: "Title successfully retrieved.".to_string(),
        title,
    }))
}
