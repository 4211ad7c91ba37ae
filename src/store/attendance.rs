//! Sessions and attendance rows.
//!
//! `insert_attendance` is the single atomic check-and-insert the redemption
//! path relies on: INSERT OR IGNORE against UNIQUE(session_id, student_id),
//! checked via changes(). Two racing redeems for the same pair can never both
//! insert.

use super::{parse_utc, Database};
use crate::models::{HistoryEntry, RosterEntry, Session};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

fn map_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let created_raw: String = row.get(4)?;
    let expires_raw: String = row.get(5)?;
    let active: i64 = row.get(6)?;
    Ok(Session {
        id: row.get(0)?,
        course_id: row.get(1)?,
        faculty_id: row.get(2)?,
        token: row.get(3)?,
        created_at: parse_utc(4, created_raw)?,
        expires_at: parse_utc(5, expires_raw)?,
        active: active != 0,
    })
}

const SESSION_COLS: &str = "id, course_id, faculty_id, token, created_at, expires_at, active";

impl Database {
    pub fn insert_session(
        &self,
        course_id: i64,
        faculty_id: i64,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (course_id, faculty_id, token, created_at, expires_at, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                course_id,
                faculty_id,
                token,
                created_at.to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )
        .context("Failed to insert session")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn session_by_token(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM sessions WHERE token = ?1", SESSION_COLS),
            params![token],
            map_session,
        )
        .optional()
        .context("Failed to look up session by token")
    }

    /// Resolve a session only if the given faculty created it. "Not found" and
    /// "not yours" are indistinguishable to the caller.
    pub fn session_owned_by(&self, session_id: i64, faculty_id: i64) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM sessions WHERE id = ?1 AND faculty_id = ?2",
                SESSION_COLS
            ),
            params![session_id, faculty_id],
            map_session,
        )
        .optional()
        .context("Failed to look up session")
    }

    /// Flip a session inactive. Returns false when the id does not resolve.
    pub fn deactivate_session(&self, session_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE sessions SET active = 0 WHERE id = ?1",
                params![session_id],
            )
            .context("Failed to deactivate session")?;
        Ok(changed > 0)
    }

    /// Atomic check-and-insert for one (session, student) pair.
    /// Returns false when the pair was already marked.
    pub fn insert_attendance(
        &self,
        session_id: i64,
        student_id: i64,
        marked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO attendances (session_id, student_id, marked_at)
                 VALUES (?1, ?2, ?3)",
                params![session_id, student_id, marked_at.to_rfc3339()],
            )
            .context("Failed to insert attendance")?;
        Ok(inserted > 0)
    }

    /// All redemptions for a session, joined with student identity.
    pub fn roster(&self, session_id: i64) -> Result<Vec<RosterEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.student_no, s.full_name, a.marked_at
             FROM attendances a
             JOIN students s ON s.id = a.student_id
             WHERE a.session_id = ?1
             ORDER BY a.marked_at",
        )?;
        let entries = stmt
            .query_map(params![session_id], |row| {
                Ok(RosterEntry {
                    student_id: row.get(0)?,
                    student_name: row.get(1)?,
                    marked_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Full attendance history for a student, newest first, with course info.
    pub fn history(&self, student_id: i64) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.course_name, c.course_code, sess.created_at, a.marked_at
             FROM attendances a
             JOIN sessions sess ON sess.id = a.session_id
             JOIN courses c ON c.id = sess.course_id
             WHERE a.student_id = ?1
             ORDER BY a.marked_at DESC",
        )?;
        let entries = stmt
            .query_map(params![student_id], |row| {
                Ok(HistoryEntry {
                    course: row.get(0)?,
                    course_code: row.get(1)?,
                    session_date: row.get(2)?,
                    marked_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
