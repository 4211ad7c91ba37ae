//! Student endpoints: token redemption and history/profile reads.

use crate::api::error::{require, ApiError};
use crate::api::routes::AppState;
use crate::auth::models::{Claims, Role};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub token: Option<String>,
}

/// POST /student/attendance/mark
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Student)?;
    let token = require(payload.token, "token")?;

    let marked = state.engine.redeem(&token, claims.user_id()?, Utc::now())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "msg": "Attendance marked successfully",
            "course": marked.course,
            "session_id": marked.session_id,
            "marked_at": marked.marked_at,
        })),
    ))
}

/// GET /student/attendance/history
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Student)?;

    let history = state
        .engine
        .student_history(claims.user_id()?)?
        .ok_or_else(|| ApiError::NotFound("Student profile not found".to_string()))?;

    Ok(Json(history))
}

/// GET /student/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Student)?;
    let user_id = claims.user_id()?;

    let user = state
        .db
        .user_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let student = state
        .db
        .student_by_user_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("Student profile not found".to_string()))?;

    Ok(Json(json!({
        "username": user.username,
        "email": user.email,
        "student_id": student.student_no,
        "full_name": student.full_name,
        "department": student.department,
        "semester": student.semester,
    })))
}
