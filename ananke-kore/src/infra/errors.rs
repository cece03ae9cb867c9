use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

use ananke_core::CoreError;
use ananke_core::course::IdentityError;
use ananke_core::gradebook::GradebookError;
use ananke_core::lms::LmsError;
use ananke_core::reconcile::ReconcileError;

use crate::application::courses::CourseError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = Json(json!({
            "message": self.message,
            "status": self.status.as_u16(),
        }));

        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::InvalidContent(message) => Self::bad_request(message),
            CoreError::Identity(err) => err.into(),
            CoreError::Lms(err) => err.into(),
            CoreError::Hub(err) => Self::bad_gateway(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<LmsError> for AppError {
    fn from(err: LmsError) -> Self {
        match err {
            LmsError::Http(_) | LmsError::AccessToken(_) => {
                Self::bad_gateway(err.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Identity(err) => err.into(),
            err @ ReconcileError::IdentityCollision { .. } => {
                Self::conflict(err.to_string())
            }
            ReconcileError::Core(err) => err.into(),
        }
    }
}

impl From<CourseError> for AppError {
    fn from(err: CourseError) -> Self {
        match err {
            CourseError::NoLaunch(_) | CourseError::NoContent => {
                Self::not_found(err.to_string())
            }
            CourseError::Forbidden { .. } => Self::forbidden(err.to_string()),
            CourseError::InvalidPath(_) => Self::bad_request(err.to_string()),
            CourseError::Exists(_) => Self::conflict(err.to_string()),
            CourseError::GradePushDisabled => Self::internal(err.to_string()),
            CourseError::Core(err) => err.into(),
            CourseError::Lms(err) => err.into(),
            CourseError::Hub(err) => Self::bad_gateway(err.to_string()),
            CourseError::Gradebook(GradebookError::Missing(path)) => {
                Self::not_found(format!("no gradebook at {}", path.display()))
            }
            CourseError::Registry(_)
            | CourseError::Gradebook(_)
            | CourseError::Os(_)
            | CourseError::Io(_) => Self::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collisions_map_to_conflict() {
        let err = AppError::from(ReconcileError::IdentityCollision {
            course_id: "c-1".into(),
            deployment_id: "d2".into(),
            resource_link_id: "r2".into(),
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn missing_snapshot_maps_to_not_found() {
        let err = AppError::from(CoreError::NotFound("no launch".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = AppError::from(CourseError::NoLaunch("alice".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn token_endpoint_failures_are_upstream_errors() {
        let err = AppError::from(LmsError::AccessToken("401".into()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);

        let err = AppError::from(LmsError::MissingAudience);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
