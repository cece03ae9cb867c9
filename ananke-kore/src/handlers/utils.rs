use axum::{Json, extract::State};
use serde_json::{Value, json};

use ananke_core::lms::load_public_jwk;

use crate::infra::{app_state::AppState, errors::AppResult};

/// Settings the frontend extension may see. Secrets never leave Kore.
pub async fn config_handler(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "message": "Configuration successfully retrieved.",
        "lti": {
            "issuer": config.lti.issuer,
            "client_id": config.lti.client_id,
            "grade_push": state.publisher.is_some(),
        },
        "feedback": {
            "remove_hidden": config.feedback.remove_hidden,
            "remove_hidden_trace": config.feedback.remove_hidden_trace,
        },
        "backup": {
            "timestamp_format": config.backup.timestamp_format,
        },
    }))
}

/// Key set the LMS uses to verify client assertions.
pub async fn jwks_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let jwk = load_public_jwk(&state.layout.public_jwk_path())?;
    Ok(Json(json!({ "keys": [jwk] })))
}
