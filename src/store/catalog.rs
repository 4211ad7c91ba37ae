//! Course catalog and enrollment registry.
//!
//! Enrollment is append-only: there is no transfer or unenroll operation.
//! Course deletion is forbidden while enrollments or sessions reference it.

use super::{is_unique_violation, Database, StoreError};
use crate::models::Course;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

fn map_course(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        course_code: row.get(1)?,
        course_name: row.get(2)?,
        department: row.get(3)?,
        semester: row.get(4)?,
        faculty_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const COURSE_COLS: &str =
    "id, course_code, course_name, department, semester, faculty_id, created_at";

impl Database {
    pub fn create_course(
        &self,
        course_code: &str,
        course_name: &str,
        department: Option<&str>,
        semester: Option<i64>,
        faculty_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO courses (course_code, course_name, department, semester, faculty_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                course_code,
                course_name,
                department,
                semester,
                faculty_id,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Course code already exists".to_string())
            } else {
                e.into()
            }
        })?;

        Ok(conn.last_insert_rowid())
    }

    pub fn course_by_id(&self, course_id: i64) -> Result<Option<Course>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLS),
            params![course_id],
            map_course,
        )
        .optional()
        .context("Failed to look up course")
    }

    pub fn courses_for_faculty(&self, faculty_id: i64) -> Result<Vec<Course>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM courses WHERE faculty_id = ?1 ORDER BY course_code",
            COURSE_COLS
        ))?;
        let courses = stmt
            .query_map(params![faculty_id], map_course)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    /// Delete a course unless enrollments or sessions still reference it.
    pub fn delete_course(&self, course_id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM courses WHERE id = ?1",
                params![course_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;
        if exists.is_none() {
            return Err(StoreError::NotFound("Course not found".to_string()));
        }

        let referenced: i64 = tx
            .query_row(
                "SELECT (SELECT COUNT(*) FROM enrollments WHERE course_id = ?1)
                      + (SELECT COUNT(*) FROM sessions WHERE course_id = ?1)",
                params![course_id],
                |row| row.get(0),
            )
            .map_err(anyhow::Error::from)?;
        if referenced > 0 {
            return Err(StoreError::Conflict(
                "Course has enrollments or sessions and cannot be deleted".to_string(),
            ));
        }

        tx.execute("DELETE FROM courses WHERE id = ?1", params![course_id])
            .map_err(anyhow::Error::from)?;
        tx.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }

    /// Enroll a student in a course. Both ids must resolve; the pair is unique.
    pub fn enroll(&self, student_id: i64, course_id: i64) -> Result<i64, StoreError> {
        let conn = self.conn.lock();

        let student_exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM students WHERE id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;
        if student_exists.is_none() {
            return Err(StoreError::NotFound("Student not found".to_string()));
        }

        let course_exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM courses WHERE id = ?1",
                params![course_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;
        if course_exists.is_none() {
            return Err(StoreError::NotFound("Course not found".to_string()));
        }

        conn.execute(
            "INSERT INTO enrollments (student_id, course_id, enrolled_at) VALUES (?1, ?2, ?3)",
            params![student_id, course_id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Student already enrolled in this course".to_string())
            } else {
                e.into()
            }
        })?;

        Ok(conn.last_insert_rowid())
    }

    pub fn is_enrolled(&self, student_id: i64, course_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let row: Option<i64> = conn
            .query_row(
                "SELECT id FROM enrollments WHERE student_id = ?1 AND course_id = ?2",
                params![student_id, course_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to check enrollment")?;
        Ok(row.is_some())
    }
}
