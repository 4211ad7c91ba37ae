//! Login and registration endpoints.

use crate::api::error::{require, ApiError};
use crate::api::routes::AppState;
use crate::auth::models::{
    LoginRequest, LoginResponse, RegisterFacultyRequest, RegisterStudentRequest,
};
use crate::store::identity::{NewFaculty, NewStudent};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{info, warn};

/// POST /login
///
/// Unknown username and wrong password produce the same 401 so callers cannot
/// enumerate accounts.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = require(payload.username, "username")?;
    let password = require(payload.password, "password")?;

    let user = state
        .db
        .authenticate(&username, &password)?
        .ok_or_else(|| {
            warn!("Failed login attempt: {}", username);
            ApiError::InvalidCredentials
        })?;

    let (access_token, expires_in) = state.jwt.generate_token(&user)?;

    info!("Login successful: {} ({})", user.username, user.role.as_str());

    Ok(Json(LoginResponse {
        access_token,
        expires_in,
        role: user.role,
        user_id: user.id,
        username: user.username,
    }))
}

/// POST /register/student
pub async fn register_student(
    State(state): State<AppState>,
    Json(payload): Json<RegisterStudentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_student = NewStudent {
        username: require(payload.username, "username")?,
        email: require(payload.email, "email")?,
        password: require(payload.password, "password")?,
        student_no: require(payload.student_id, "student_id")?,
        full_name: require(payload.full_name, "full_name")?,
        department: payload.department,
        semester: payload.semester,
    };

    let user_id = state.db.register_student(&new_student)?;

    info!("Student registered: {} (user {})", new_student.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "msg": "Student registered successfully", "user_id": user_id })),
    ))
}

/// POST /register/faculty
pub async fn register_faculty(
    State(state): State<AppState>,
    Json(payload): Json<RegisterFacultyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_faculty = NewFaculty {
        username: require(payload.username, "username")?,
        email: require(payload.email, "email")?,
        password: require(payload.password, "password")?,
        faculty_no: require(payload.faculty_id, "faculty_id")?,
        full_name: require(payload.full_name, "full_name")?,
        department: payload.department,
    };

    let user_id = state.db.register_faculty(&new_faculty)?;

    info!("Faculty registered: {} (user {})", new_faculty.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "msg": "Faculty registered successfully", "user_id": user_id })),
    ))
}
