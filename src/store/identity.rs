//! Identity store: user accounts, student/faculty profiles, credential checks.
//!
//! Registration creates the user and its profile in one transaction so a
//! duplicate profile number can never leave an orphan user row behind.

use super::{is_unique_violation, Database, StoreError};
use crate::auth::models::Role;
use crate::models::{Faculty, Student, User, UserOverview};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

pub struct NewStudent {
    pub username: String,
    pub email: String,
    pub password: String,
    pub student_no: String,
    pub full_name: String,
    pub department: Option<String>,
    pub semester: Option<i64>,
}

pub struct NewFaculty {
    pub username: String,
    pub email: String,
    pub password: String,
    pub faculty_no: String,
    pub full_name: String,
    pub department: Option<String>,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&role_str).unwrap_or(Role::Student),
        created_at: row.get(5)?,
    })
}

fn map_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        user_id: row.get(1)?,
        student_no: row.get(2)?,
        full_name: row.get(3)?,
        department: row.get(4)?,
        semester: row.get(5)?,
    })
}

fn map_faculty(row: &Row<'_>) -> rusqlite::Result<Faculty> {
    Ok(Faculty {
        id: row.get(0)?,
        user_id: row.get(1)?,
        faculty_no: row.get(2)?,
        full_name: row.get(3)?,
        department: row.get(4)?,
    })
}

const USER_COLS: &str = "id, username, email, password_hash, role, created_at";

impl Database {
    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLS),
            params![username],
            map_user,
        )
        .optional()
        .context("Failed to look up user by username")
    }

    pub fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
            params![user_id],
            map_user,
        )
        .optional()
        .context("Failed to look up user by id")
    }

    /// Verify credentials. Returns `None` for unknown username and wrong
    /// password alike; the caller must not distinguish the two.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.user_by_username(username)? else {
            return Ok(None);
        };

        let valid = verify(password, &user.password_hash).context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }

    pub fn student_by_user_id(&self, user_id: i64) -> Result<Option<Student>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, student_no, full_name, department, semester
             FROM students WHERE user_id = ?1",
            params![user_id],
            map_student,
        )
        .optional()
        .context("Failed to look up student profile")
    }

    pub fn faculty_by_user_id(&self, user_id: i64) -> Result<Option<Faculty>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, faculty_no, full_name, department
             FROM faculties WHERE user_id = ?1",
            params![user_id],
            map_faculty,
        )
        .optional()
        .context("Failed to look up faculty profile")
    }

    /// Create a student account: user row + profile row, all or nothing.
    pub fn register_student(&self, new: &NewStudent) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let user_id = insert_user(&tx, &new.username, &new.email, &new.password, Role::Student)?;

        tx.execute(
            "INSERT INTO students (user_id, student_no, full_name, department, semester)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, new.student_no, new.full_name, new.department, new.semester],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Student ID already exists".to_string())
            } else {
                e.into()
            }
        })?;

        tx.commit().map_err(anyhow::Error::from)?;
        Ok(user_id)
    }

    /// Create a faculty account: user row + profile row, all or nothing.
    pub fn register_faculty(&self, new: &NewFaculty) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let user_id = insert_user(&tx, &new.username, &new.email, &new.password, Role::Faculty)?;

        tx.execute(
            "INSERT INTO faculties (user_id, faculty_no, full_name, department)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, new.faculty_no, new.full_name, new.department],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Faculty ID already exists".to_string())
            } else {
                e.into()
            }
        })?;

        tx.commit().map_err(anyhow::Error::from)?;
        Ok(user_id)
    }

    /// Delete a student: their enrollment and attendance rows, the profile,
    /// and the user account, all in one transaction. Only the removed
    /// student's own history goes with them.
    pub fn delete_student(&self, student_id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let user_id: Option<i64> = tx
            .query_row(
                "SELECT user_id FROM students WHERE id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;

        let Some(user_id) = user_id else {
            return Err(StoreError::NotFound("Student not found".to_string()));
        };

        // Dependent rows have no ON DELETE action; clear them before the
        // user row so the profile cascade cannot abort on a foreign key.
        tx.execute(
            "DELETE FROM attendances WHERE student_id = ?1",
            params![student_id],
        )
        .map_err(anyhow::Error::from)?;
        tx.execute(
            "DELETE FROM enrollments WHERE student_id = ?1",
            params![student_id],
        )
        .map_err(anyhow::Error::from)?;

        // ON DELETE CASCADE removes the profile row with the user.
        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .map_err(anyhow::Error::from)?;

        tx.commit().map_err(anyhow::Error::from)?;
        info!("Deleted student {} (user {})", student_id, user_id);
        Ok(())
    }

    /// Delete a faculty profile and its user account together. Forbidden
    /// while courses or sessions still reference the profile: sessions carry
    /// other students' attendance history.
    pub fn delete_faculty(&self, faculty_id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let user_id: Option<i64> = tx
            .query_row(
                "SELECT user_id FROM faculties WHERE id = ?1",
                params![faculty_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;

        let Some(user_id) = user_id else {
            return Err(StoreError::NotFound("Faculty not found".to_string()));
        };

        let referenced: i64 = tx
            .query_row(
                "SELECT (SELECT COUNT(*) FROM courses WHERE faculty_id = ?1)
                      + (SELECT COUNT(*) FROM sessions WHERE faculty_id = ?1)",
                params![faculty_id],
                |row| row.get(0),
            )
            .map_err(anyhow::Error::from)?;
        if referenced > 0 {
            return Err(StoreError::Conflict(
                "Faculty has courses or sessions and cannot be deleted".to_string(),
            ));
        }

        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .map_err(anyhow::Error::from)?;

        tx.commit().map_err(anyhow::Error::from)?;
        info!("Deleted faculty {} (user {})", faculty_id, user_id);
        Ok(())
    }

    /// All users with their role-specific profile fields, for the admin list.
    pub fn list_users(&self) -> Result<Vec<UserOverview>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.email, u.role, u.created_at,
                    s.student_no, s.full_name, s.department,
                    f.faculty_no, f.full_name, f.department
             FROM users u
             LEFT JOIN students s ON s.user_id = u.id
             LEFT JOIN faculties f ON f.user_id = u.id
             ORDER BY u.id",
        )?;

        let users = stmt
            .query_map([], |row| {
                let role_str: String = row.get(3)?;
                let role = Role::parse(&role_str).unwrap_or(Role::Student);
                let (full_name, department) = match role {
                    Role::Student => (row.get(6)?, row.get(7)?),
                    Role::Faculty => (row.get(9)?, row.get(10)?),
                    Role::Admin => (None, None),
                };
                Ok(UserOverview {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    role,
                    created_at: row.get(4)?,
                    student_id: row.get(5)?,
                    faculty_id: row.get(8)?,
                    full_name,
                    department,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

fn insert_user(
    tx: &Connection,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<i64, StoreError> {
    // Pre-checks give the caller a field-specific conflict message; the UNIQUE
    // constraints still back them up under concurrent registration.
    let username_taken: Option<i64> = tx
        .query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)?;
    if username_taken.is_some() {
        return Err(StoreError::Conflict("Username already exists".to_string()));
    }

    let email_taken: Option<i64> = tx
        .query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)?;
    if email_taken.is_some() {
        return Err(StoreError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash(password, DEFAULT_COST)
        .context("Failed to hash password")
        .map_err(StoreError::Other)?;

    tx.execute(
        "INSERT INTO users (username, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, email, password_hash, role.as_str(), Utc::now().to_rfc3339()],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict("Username or email already exists".to_string())
        } else {
            e.into()
        }
    })?;

    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(username: &str, student_no: &str) -> NewStudent {
        NewStudent {
            username: username.to_string(),
            email: format!("{}@student.edu", username),
            password: "password123".to_string(),
            student_no: student_no.to_string(),
            full_name: "Test Student".to_string(),
            department: Some("CS".to_string()),
            semester: Some(1),
        }
    }

    fn new_faculty(username: &str, faculty_no: &str) -> NewFaculty {
        NewFaculty {
            username: username.to_string(),
            email: format!("{}@college.edu", username),
            password: "password123".to_string(),
            faculty_no: faculty_no.to_string(),
            full_name: "Test Faculty".to_string(),
            department: None,
        }
    }

    #[test]
    fn test_register_and_authenticate() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.register_student(&new_student("jane", "S100")).unwrap();

        let user = db.authenticate("jane", "password123").unwrap().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.role, Role::Student);

        // Wrong password and unknown user look the same
        assert!(db.authenticate("jane", "wrong").unwrap().is_none());
        assert!(db.authenticate("nobody", "password123").unwrap().is_none());

        let student = db.student_by_user_id(user_id).unwrap().unwrap();
        assert_eq!(student.student_no, "S100");
    }

    #[test]
    fn test_duplicate_username_leaves_no_partial_rows() {
        let db = Database::open_in_memory().unwrap();
        db.register_student(&new_student("jane", "S100")).unwrap();

        // Same username, different student number
        let err = db.register_student(&new_student("jane", "S200")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // No orphan student row was created for S200
        assert!(db
            .list_users()
            .unwrap()
            .iter()
            .all(|u| u.student_id.as_deref() != Some("S200")));
        let conn = db.conn.lock();
        let students: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(students, 1);
    }

    #[test]
    fn test_duplicate_student_no_rolls_back_user() {
        let db = Database::open_in_memory().unwrap();
        db.register_student(&new_student("jane", "S100")).unwrap();

        let err = db.register_student(&new_student("mary", "S100")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The user insert for mary must have rolled back with the profile
        assert!(db.user_by_username("mary").unwrap().is_none());
    }

    #[test]
    fn test_delete_student_removes_user() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.register_student(&new_student("jane", "S100")).unwrap();
        let student = db.student_by_user_id(user_id).unwrap().unwrap();

        db.delete_student(student.id).unwrap();
        assert!(db.user_by_username("jane").unwrap().is_none());
        assert!(db.student_by_user_id(user_id).unwrap().is_none());

        let err = db.delete_student(student.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_student_removes_dependent_rows() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.register_student(&new_student("jane", "S100")).unwrap();
        let student = db.student_by_user_id(user_id).unwrap().unwrap();
        let faculty_user = db.register_faculty(&new_faculty("prof", "F100")).unwrap();
        let faculty = db.faculty_by_user_id(faculty_user).unwrap().unwrap();
        let course_id = db
            .create_course("CS101", "Intro to CS", None, None, None)
            .unwrap();
        db.enroll(student.id, course_id).unwrap();

        let now = chrono::Utc::now();
        let session_id = db
            .insert_session(course_id, faculty.id, "tok-1", now, now + chrono::Duration::minutes(3))
            .unwrap();
        assert!(db.insert_attendance(session_id, student.id, now).unwrap());

        // Enrollment and attendance rows must not block the delete
        db.delete_student(student.id).unwrap();
        assert!(db.user_by_username("jane").unwrap().is_none());

        let conn = db.conn.lock();
        let dependents: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM enrollments WHERE student_id = ?1)
                      + (SELECT COUNT(*) FROM attendances WHERE student_id = ?1)",
                params![student.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(dependents, 0);
    }

    #[test]
    fn test_delete_faculty_removes_user() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.register_faculty(&new_faculty("prof", "F100")).unwrap();
        let faculty = db.faculty_by_user_id(user_id).unwrap().unwrap();

        db.delete_faculty(faculty.id).unwrap();
        assert!(db.user_by_username("prof").unwrap().is_none());
        assert!(db.faculty_by_user_id(user_id).unwrap().is_none());

        let err = db.delete_faculty(faculty.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_faculty_forbidden_while_referenced() {
        let db = Database::open_in_memory().unwrap();

        // Referenced by a course
        let owner_user = db.register_faculty(&new_faculty("owner", "F100")).unwrap();
        let owner = db.faculty_by_user_id(owner_user).unwrap().unwrap();
        let course_id = db
            .create_course("CS101", "Intro to CS", None, None, Some(owner.id))
            .unwrap();
        assert!(matches!(
            db.delete_faculty(owner.id).unwrap_err(),
            StoreError::Conflict(_)
        ));

        // Referenced by a session only
        let runner_user = db.register_faculty(&new_faculty("runner", "F200")).unwrap();
        let runner = db.faculty_by_user_id(runner_user).unwrap().unwrap();
        let now = chrono::Utc::now();
        db.insert_session(course_id, runner.id, "tok-1", now, now + chrono::Duration::minutes(3))
            .unwrap();
        assert!(matches!(
            db.delete_faculty(runner.id).unwrap_err(),
            StoreError::Conflict(_)
        ));

        // Neither user row was touched
        assert!(db.user_by_username("owner").unwrap().is_some());
        assert!(db.user_by_username("runner").unwrap().is_some());
    }

    #[test]
    fn test_list_users_includes_profile_fields() {
        let db = Database::open_in_memory().unwrap();
        db.register_student(&new_student("jane", "S100")).unwrap();
        db.register_faculty(&NewFaculty {
            username: "prof".to_string(),
            email: "prof@college.edu".to_string(),
            password: "password123".to_string(),
            faculty_no: "F100".to_string(),
            full_name: "Prof Test".to_string(),
            department: None,
        })
        .unwrap();

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.student_id.as_deref() == Some("S100")));
        assert!(users.iter().any(|u| u.faculty_id.as_deref() == Some("F100")));
    }
}
