use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header::AUTHORIZATION},
};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use ananke_core::{
    course::CourseState,
    lti::LaunchClaims,
    reconcile::Launch,
    restart::RestartTicket,
};

use crate::handlers::require_user;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct PostAuthRequest {
    pub user: String,
    /// Decoded LTI launch claims as stored by the hub authenticator.
    pub auth_state: Value,
}

#[derive(Debug, Serialize)]
pub struct PostAuthResponse {
    pub message: String,
    pub course_id: String,
    pub state: CourseState,
    pub restart_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<String>,
}

/// Accepts `Authorization: token <t>` (the hub's scheme) or `Bearer <t>`.
fn check_hook_token(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = state.hook_token() else {
        warn!("post-auth hook called but no hub API token is configured");
        return Err(AppError::unauthorized("hook token not configured"));
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("token ")
                .or_else(|| value.strip_prefix("Bearer "))
        })
        .map(str::trim);
    match presented {
        Some(token)
            if constant_time_eq(token.as_bytes(), expected.as_bytes()) =>
        {
            Ok(())
        }
        _ => Err(AppError::unauthorized("missing or invalid hook token")),
    }
}

/// Runs reconciliation for one authenticated hub login.
///
/// # Response
///
/// ```json
/// {
///   "message": "Launch reconciled.",
///   "course_id": "c-3f1a9b0c2d4e5f60",
///   "state": "registered",
///   "restart_required": true
/// }
/// ```
///
/// - `400` when the claims cannot be mapped onto a course
/// - `401` without the hub's API token
/// - `409` when the course id is bound to another placement
pub async fn post_auth_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PostAuthRequest>, JsonRejection>,
) -> AppResult<Json<PostAuthResponse>> {
    check_hook_token(&state, &headers)?;
    let Json(request) = payload?;
    let user = require_user(&request.user)?;
    let claims = LaunchClaims::from_value(request.auth_state)?;
    let launch = Launch::new(user, claims);

    let outcome = {
        let engine = state.engine.lock().await;
        engine.reconcile(&launch).await?
    };

    if outcome.restart_required
        && let RestartTicket::AlreadyPending = state.restarts.request()
    {
        info!(
            course_id = %outcome.identity.course_id,
            "registry change joins the pending hub restart"
        );
    }

    let message = match &outcome.registry_error {
        Some(_) => "Launch accepted; course registration failed.",
        None => "Launch reconciled.",
    };
    Ok(Json(PostAuthResponse {
        message: message.to_string(),
        course_id: outcome.identity.course_id,
        state: outcome.state,
        restart_required: outcome.restart_required,
        registry_error: outcome.registry_error,
    }))
}
