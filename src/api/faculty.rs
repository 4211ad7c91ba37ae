//! Faculty endpoints: session lifecycle and course/profile reads.

use crate::api::error::{require, ApiError};
use crate::api::routes::AppState;
use crate::auth::models::{Claims, Role};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub course_id: Option<i64>,
    pub duration_minutes: Option<i64>,
}

/// POST /faculty/session/create
pub async fn create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Faculty)?;
    let course_id = require(payload.course_id, "course_id")?;

    let opened = state.engine.open_session(
        course_id,
        claims.user_id()?,
        payload.duration_minutes,
        Utc::now(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "msg": "Session created successfully",
            "session_id": opened.session_id,
            "token": opened.token,
            "expires_at": opened.expires_at.to_rfc3339(),
            "qr_code": opened.qr_code,
        })),
    ))
}

/// GET /faculty/session/:id/attendances
///
/// Sessions owned by other faculty are reported as not found, so callers
/// cannot probe for session existence.
pub async fn session_attendances(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Faculty)?;

    let roster = state
        .engine
        .session_roster(session_id, claims.user_id()?)?
        .ok_or_else(|| ApiError::NotFound("Session not found or unauthorized".to_string()))?;

    Ok(Json(roster))
}

/// GET /faculty/courses
pub async fn my_courses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Faculty)?;

    let faculty = state
        .db
        .faculty_by_user_id(claims.user_id()?)?
        .ok_or_else(|| ApiError::NotFound("Faculty profile not found".to_string()))?;

    let courses = state.db.courses_for_faculty(faculty.id)?;

    Ok(Json(json!({
        "total_courses": courses.len(),
        "courses": courses,
    })))
}

/// GET /faculty/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Faculty)?;
    let user_id = claims.user_id()?;

    let user = state
        .db
        .user_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let faculty = state
        .db
        .faculty_by_user_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("Faculty profile not found".to_string()))?;

    Ok(Json(json!({
        "username": user.username,
        "email": user.email,
        "faculty_id": faculty.faculty_no,
        "full_name": faculty.full_name,
        "department": faculty.department,
    })))
}
