//! Domain records and the denormalized views the API returns.

use crate::auth::models::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account. Role is fixed at creation; there is no role-change operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub created_at: String,
}

/// Student profile, owned 1:1 by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub user_id: i64,
    pub student_no: String,
    pub full_name: String,
    pub department: Option<String>,
    pub semester: Option<i64>,
}

/// Faculty profile, owned 1:1 by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faculty {
    pub id: i64,
    pub user_id: i64,
    pub faculty_no: String,
    pub full_name: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub department: Option<String>,
    pub semester: Option<i64>,
    pub faculty_id: Option<i64>,
    pub created_at: String,
}

/// A time-boxed attendance window for one course. Expiry is derived at read
/// time from `expires_at`; no background job flips sessions over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub course_id: i64,
    pub faculty_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

// ===== Denormalized API views =====

/// One roster row: who redeemed the session token and when.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub student_id: String,
    pub student_name: String,
    pub marked_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRoster {
    pub session_id: i64,
    pub course: String,
    pub total_attendances: usize,
    pub attendances: Vec<RosterEntry>,
}

/// One history row for a student, augmented with course info.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub course: String,
    pub course_code: String,
    pub session_date: String,
    pub marked_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentHistory {
    pub student_name: String,
    pub total_attendances: usize,
    pub attendance_history: Vec<HistoryEntry>,
}

/// Result of a successful token redemption.
#[derive(Debug, Clone, Serialize)]
pub struct MarkedAttendance {
    pub course: String,
    pub session_id: i64,
    pub marked_at: String,
}

/// Admin user listing row with role-specific profile fields folded in.
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// Entity counts for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_students: i64,
    pub total_faculties: i64,
    pub total_courses: i64,
    pub total_sessions: i64,
    pub total_attendances: i64,
}
