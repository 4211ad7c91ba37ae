//! Unified API error taxonomy.
//!
//! Every handler failure maps to a stable machine-readable kind plus a human
//! message. Internal detail is logged, never exposed to the caller.

use crate::engine::{OpenSessionError, RedeemError};
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    InvalidCredentials,
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<OpenSessionError> for ApiError {
    fn from(err: OpenSessionError) -> Self {
        match err {
            OpenSessionError::UnknownCourse => {
                ApiError::Validation("Course not found".to_string())
            }
            OpenSessionError::NoProfile => {
                ApiError::NotFound("Faculty profile not found".to_string())
            }
            OpenSessionError::Store(err) => ApiError::Internal(err),
        }
    }
}

impl From<RedeemError> for ApiError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::InvalidToken => ApiError::Validation("Invalid QR code".to_string()),
            RedeemError::Expired => ApiError::Validation("QR code has expired".to_string()),
            RedeemError::NoProfile => {
                ApiError::NotFound("Student profile not found".to_string())
            }
            RedeemError::NotEnrolled => {
                ApiError::Forbidden("You are not enrolled in this course".to_string())
            }
            RedeemError::AlreadyMarked => {
                ApiError::Conflict("Attendance already marked for this session".to_string())
            }
            RedeemError::Store(err) => ApiError::Internal(err),
        }
    }
}

/// Pull a required field out of a JSON body, or fail with a 400.
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_redeem_error_statuses() {
        let cases = [
            (RedeemError::InvalidToken, StatusCode::BAD_REQUEST),
            (RedeemError::Expired, StatusCode::BAD_REQUEST),
            (RedeemError::NoProfile, StatusCode::NOT_FOUND),
            (RedeemError::NotEnrolled, StatusCode::FORBIDDEN),
            (RedeemError::AlreadyMarked, StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_require() {
        assert_eq!(require(Some(1), "n").unwrap(), 1);
        assert!(matches!(
            require::<i64>(None, "n").unwrap_err(),
            ApiError::Validation(_)
        ));
    }
}
