//! Durable state: a single SQLite database behind a mutex.
//!
//! One connection serializes statements; WAL keeps writes cheap at this scale.
//! Correctness of concurrent redemption does not depend on the mutex - it
//! rides on the UNIQUE(session_id, student_id) constraint in the schema.

pub mod attendance;
pub mod catalog;
pub mod identity;

use crate::config::Config;
use crate::models::Stats;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY,
    user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    student_no TEXT UNIQUE NOT NULL,
    full_name TEXT NOT NULL,
    department TEXT,
    semester INTEGER
);

CREATE TABLE IF NOT EXISTS faculties (
    id INTEGER PRIMARY KEY,
    user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    faculty_no TEXT UNIQUE NOT NULL,
    full_name TEXT NOT NULL,
    department TEXT
);

CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY,
    course_code TEXT UNIQUE NOT NULL,
    course_name TEXT NOT NULL,
    department TEXT,
    semester INTEGER,
    faculty_id INTEGER REFERENCES faculties(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL REFERENCES students(id),
    course_id INTEGER NOT NULL REFERENCES courses(id),
    enrolled_at TEXT NOT NULL,
    UNIQUE(student_id, course_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    faculty_id INTEGER NOT NULL REFERENCES faculties(id),
    token TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_sessions_token ON sessions(token);

CREATE TABLE IF NOT EXISTS attendances (
    id INTEGER PRIMARY KEY,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    student_id INTEGER NOT NULL REFERENCES students(id),
    marked_at TEXT NOT NULL,
    UNIQUE(session_id, student_id)
);

CREATE INDEX IF NOT EXISTS idx_attendances_student
    ON attendances(student_id, marked_at DESC);
"#;

/// Shared handle to the SQLite store.
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the default admin account when no admin exists yet.
    pub fn ensure_default_admin(&self, config: &Config) -> Result<()> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE role = 'admin'", [], |row| {
                row.get(0)
            })
            .context("Failed to check for admin users")?;

        if count > 0 {
            return Ok(());
        }

        let password_hash = bcrypt::hash(&config.admin_password, bcrypt::DEFAULT_COST)
            .context("Failed to hash admin password")?;

        conn.execute(
            "INSERT INTO users (username, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, 'admin', ?4)",
            rusqlite::params![
                config.admin_username,
                format!("{}@localhost", config.admin_username),
                password_hash,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert admin user")?;

        info!("Default admin user created (username: {})", config.admin_username);
        warn!("Change the default admin password before deploying");

        Ok(())
    }

    /// Entity counts for the admin dashboard.
    pub fn stats(&self) -> Result<Stats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("Failed to count {}", table))
        };

        Ok(Stats {
            total_students: count("students")?,
            total_faculties: count("faculties")?,
            total_courses: count("courses")?,
            total_sessions: count("sessions")?,
            total_attendances: count("attendances")?,
        })
    }
}

/// Errors the store reports with enough shape for the API to pick a status.
#[derive(Debug)]
pub enum StoreError {
    Conflict(String),
    NotFound(String),
    Other(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "conflict: {}", msg),
            StoreError::NotFound(msg) => write!(f, "not found: {}", msg),
            StoreError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Other(err.into())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Other(err)
    }
}

/// True when an insert hit a UNIQUE or PRIMARY KEY constraint.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
                && (f.extended_code == 2067 || f.extended_code == 1555)
    )
}

/// Parse an RFC 3339 timestamp read back from a TEXT column.
pub(crate) fn parse_utc(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Seed demo accounts and a sample course for local testing. Idempotent.
pub fn seed_demo(db: &Database) -> Result<()> {
    use identity::{NewFaculty, NewStudent};

    if db.user_by_username("prof_smith")?.is_some() {
        info!("Demo data already present, skipping seed");
        return Ok(());
    }

    let faculty_user = db
        .register_faculty(&NewFaculty {
            username: "prof_smith".to_string(),
            email: "smith@college.edu".to_string(),
            password: "password123".to_string(),
            faculty_no: "F001".to_string(),
            full_name: "Professor Smith".to_string(),
            department: Some("Computer Science".to_string()),
        })
        .map_err(|e| anyhow::anyhow!("demo faculty: {}", e))?;

    let faculty = db
        .faculty_by_user_id(faculty_user)?
        .context("demo faculty profile missing after registration")?;

    let course_id = db
        .create_course(
            "CS101",
            "Introduction to Computer Science",
            Some("Computer Science"),
            Some(1),
            Some(faculty.id),
        )
        .map_err(|e| anyhow::anyhow!("demo course: {}", e))?;

    let student_user = db
        .register_student(&NewStudent {
            username: "john_doe".to_string(),
            email: "john@student.edu".to_string(),
            password: "password123".to_string(),
            student_no: "S001".to_string(),
            full_name: "John Doe".to_string(),
            department: Some("Computer Science".to_string()),
            semester: Some(1),
        })
        .map_err(|e| anyhow::anyhow!("demo student: {}", e))?;

    let student = db
        .student_by_user_id(student_user)?
        .context("demo student profile missing after registration")?;

    db.enroll(student.id, course_id)
        .map_err(|e| anyhow::anyhow!("demo enrollment: {}", e))?;

    info!("Demo data created:");
    info!("- Faculty: prof_smith / password123");
    info!("- Student: john_doe / password123 (enrolled in CS101)");

    Ok(())
}
