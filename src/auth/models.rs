//! Authentication models: roles, JWT claims, login/register payloads.

use crate::api::error::ApiError;
use serde::{Deserialize, Serialize};

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "faculty")]
    Faculty,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub username: String,
    pub role: Role,
    pub exp: usize, // expiration timestamp
}

impl Claims {
    /// Explicit role check performed at the top of every protected handler.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Missing required role: {}",
                role.as_str()
            )))
        }
    }

    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.sub.parse().map_err(|_| ApiError::Unauthorized)
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_in: usize, // seconds until expiration
    pub role: Role,
    pub user_id: i64,
    pub username: String,
}

/// Student registration request
#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub student_id: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i64>,
}

/// Faculty registration request
#[derive(Debug, Deserialize)]
pub struct RegisterFacultyRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub faculty_id: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
}
