//! Admin endpoints: user/course/enrollment management and dashboard counts.

use crate::api::error::{require, ApiError};
use crate::api::routes::AppState;
use crate::auth::models::{Claims, Role};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    let users = state.db.list_users()?;

    Ok(Json(json!({
        "total_users": users.len(),
        "users": users,
    })))
}

/// GET /admin/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;
    Ok(Json(state.db.stats()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i64>,
    pub faculty_id: Option<i64>,
}

/// POST /admin/course
pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    let course_code = require(payload.course_code, "course_code")?;
    let course_name = require(payload.course_name, "course_name")?;

    let course_id = state.db.create_course(
        &course_code,
        &course_name,
        payload.department.as_deref(),
        payload.semester,
        payload.faculty_id,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "msg": "Course created successfully", "course_id": course_id })),
    ))
}

/// DELETE /admin/course/:id
///
/// Deletion is forbidden while enrollments or sessions still reference the
/// course; cascading would silently destroy attendance history.
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    state.db.delete_course(course_id)?;

    Ok(Json(json!({ "msg": "Course deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
}

/// POST /admin/enrollment
pub async fn create_enrollment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    let student_id = require(payload.student_id, "student_id")?;
    let course_id = require(payload.course_id, "course_id")?;

    let enrollment_id = state.db.enroll(student_id, course_id)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "msg": "Student enrolled successfully", "enrollment_id": enrollment_id })),
    ))
}

/// DELETE /admin/student/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    state.db.delete_student(student_id)?;

    Ok(Json(json!({ "msg": "Student deleted successfully" })))
}

/// DELETE /admin/faculty/:id
pub async fn delete_faculty(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(faculty_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    state.db.delete_faculty(faculty_id)?;

    Ok(Json(json!({ "msg": "Faculty deleted successfully" })))
}

/// POST /admin/session/:id/deactivate
pub async fn deactivate_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    claims.require_role(Role::Admin)?;

    if !state.engine.deactivate_session(session_id)? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    Ok(Json(json!({ "msg": "Session deactivated" })))
}
