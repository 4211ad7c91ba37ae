//! Session/token engine: the redemption protocol core.
//!
//! Mints unguessable time-bound tokens, validates redemptions exactly once
//! per (session, student) pair, and enforces enrollment before recording
//! attendance. All operations take `now` as a parameter so expiry is always a
//! wall-clock comparison against one clock source and tests never sleep.

use crate::models::{MarkedAttendance, SessionRoster, StudentHistory};
use crate::store::Database;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_SESSION_MINUTES: i64 = 3;

#[derive(Clone)]
pub struct AttendanceEngine {
    db: Database,
}

/// What `open_session` hands back to the caller for display.
#[derive(Debug, Clone, Serialize)]
pub struct OpenedSession {
    pub session_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub qr_code: String,
}

#[derive(Debug)]
pub enum OpenSessionError {
    UnknownCourse,
    NoProfile,
    Store(anyhow::Error),
}

impl fmt::Display for OpenSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenSessionError::UnknownCourse => write!(f, "Course not found"),
            OpenSessionError::NoProfile => write!(f, "Faculty profile not found"),
            OpenSessionError::Store(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug)]
pub enum RedeemError {
    InvalidToken,
    Expired,
    NoProfile,
    NotEnrolled,
    AlreadyMarked,
    Store(anyhow::Error),
}

impl fmt::Display for RedeemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeemError::InvalidToken => write!(f, "Invalid QR code"),
            RedeemError::Expired => write!(f, "QR code has expired"),
            RedeemError::NoProfile => write!(f, "Student profile not found"),
            RedeemError::NotEnrolled => write!(f, "You are not enrolled in this course"),
            RedeemError::AlreadyMarked => write!(f, "Attendance already marked for this session"),
            RedeemError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl AttendanceEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a time-boxed attendance session for a course.
    ///
    /// Every call mints a fresh session and token; multiple concurrently
    /// active sessions per course are allowed by design.
    pub fn open_session(
        &self,
        course_id: i64,
        faculty_user_id: i64,
        duration_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<OpenedSession, OpenSessionError> {
        let faculty = self
            .db
            .faculty_by_user_id(faculty_user_id)
            .map_err(OpenSessionError::Store)?
            .ok_or(OpenSessionError::NoProfile)?;

        self.db
            .course_by_id(course_id)
            .map_err(OpenSessionError::Store)?
            .ok_or(OpenSessionError::UnknownCourse)?;

        let minutes = duration_minutes
            .filter(|&m| m > 0)
            .unwrap_or(DEFAULT_SESSION_MINUTES);

        // UUID v4: 122 random bits from the OS CSPRNG, unique across all
        // sessions ever for any realistic deployment.
        let token = Uuid::new_v4().to_string();
        let expires_at = now + Duration::minutes(minutes);

        let session_id = self
            .db
            .insert_session(course_id, faculty.id, &token, now, expires_at)
            .map_err(OpenSessionError::Store)?;

        let qr_code = crate::qr::data_uri(&token).map_err(OpenSessionError::Store)?;

        info!(
            session_id,
            course_id,
            faculty_id = faculty.id,
            minutes,
            "Session opened"
        );

        Ok(OpenedSession {
            session_id,
            token,
            expires_at,
            qr_code,
        })
    }

    /// Redeem a session token for the calling student.
    ///
    /// Safe under concurrent calls: the final check-and-insert is a single
    /// INSERT OR IGNORE against the unique (session, student) constraint, so
    /// two racing redeems yield exactly one success and one `AlreadyMarked`.
    pub fn redeem(
        &self,
        token: &str,
        student_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<MarkedAttendance, RedeemError> {
        let session = self
            .db
            .session_by_token(token)
            .map_err(RedeemError::Store)?
            .ok_or(RedeemError::InvalidToken)?;

        // Expiry is strict: now == expires_at is already expired.
        if !session.active || now >= session.expires_at {
            return Err(RedeemError::Expired);
        }

        let student = self
            .db
            .student_by_user_id(student_user_id)
            .map_err(RedeemError::Store)?
            .ok_or(RedeemError::NoProfile)?;

        let enrolled = self
            .db
            .is_enrolled(student.id, session.course_id)
            .map_err(RedeemError::Store)?;
        if !enrolled {
            return Err(RedeemError::NotEnrolled);
        }

        let inserted = self
            .db
            .insert_attendance(session.id, student.id, now)
            .map_err(RedeemError::Store)?;
        if !inserted {
            return Err(RedeemError::AlreadyMarked);
        }

        let course = self
            .db
            .course_by_id(session.course_id)
            .map_err(RedeemError::Store)?;

        info!(
            session_id = session.id,
            student_id = student.id,
            "Attendance marked"
        );

        Ok(MarkedAttendance {
            course: course.map(|c| c.course_name).unwrap_or_else(|| "Unknown".to_string()),
            session_id: session.id,
            marked_at: now.to_rfc3339(),
        })
    }

    /// Roster for a session the calling faculty owns. `None` covers both an
    /// unknown session and one created by someone else.
    pub fn session_roster(
        &self,
        session_id: i64,
        faculty_user_id: i64,
    ) -> anyhow::Result<Option<SessionRoster>> {
        let Some(faculty) = self.db.faculty_by_user_id(faculty_user_id)? else {
            return Ok(None);
        };
        let Some(session) = self.db.session_owned_by(session_id, faculty.id)? else {
            return Ok(None);
        };

        let attendances = self.db.roster(session.id)?;
        let course = self.db.course_by_id(session.course_id)?;

        Ok(Some(SessionRoster {
            session_id: session.id,
            course: course.map(|c| c.course_name).unwrap_or_else(|| "Unknown".to_string()),
            total_attendances: attendances.len(),
            attendances,
        }))
    }

    /// Full attendance history for the calling student, newest first.
    /// `None` means the caller has no student profile.
    pub fn student_history(&self, student_user_id: i64) -> anyhow::Result<Option<StudentHistory>> {
        let Some(student) = self.db.student_by_user_id(student_user_id)? else {
            return Ok(None);
        };

        let attendance_history = self.db.history(student.id)?;

        Ok(Some(StudentHistory {
            student_name: student.full_name,
            total_attendances: attendance_history.len(),
            attendance_history,
        }))
    }

    /// Admin action: flip a session inactive. Redemptions then fail as
    /// expired. Returns false when the session id does not resolve.
    pub fn deactivate_session(&self, session_id: i64) -> anyhow::Result<bool> {
        let deactivated = self.db.deactivate_session(session_id)?;
        if deactivated {
            info!(session_id, "Session deactivated");
        }
        Ok(deactivated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::identity::{NewFaculty, NewStudent};
    use std::sync::{Arc, Barrier};

    struct Fixture {
        engine: AttendanceEngine,
        db: Database,
        course_id: i64,
        faculty_user: i64,
        student_user: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let engine = AttendanceEngine::new(db.clone());

        let faculty_user = db
            .register_faculty(&NewFaculty {
                username: "prof".to_string(),
                email: "prof@college.edu".to_string(),
                password: "password123".to_string(),
                faculty_no: "F100".to_string(),
                full_name: "Prof Test".to_string(),
                department: None,
            })
            .unwrap();
        let faculty = db.faculty_by_user_id(faculty_user).unwrap().unwrap();

        let course_id = db
            .create_course("CS101", "Intro to CS", None, Some(1), Some(faculty.id))
            .unwrap();

        let student_user = enroll_student(&db, course_id, "jane", "S100");

        Fixture {
            engine,
            db,
            course_id,
            faculty_user,
            student_user,
        }
    }

    fn enroll_student(db: &Database, course_id: i64, username: &str, student_no: &str) -> i64 {
        let user_id = register_student(db, username, student_no);
        let student = db.student_by_user_id(user_id).unwrap().unwrap();
        db.enroll(student.id, course_id).unwrap();
        user_id
    }

    fn register_student(db: &Database, username: &str, student_no: &str) -> i64 {
        db.register_student(&NewStudent {
            username: username.to_string(),
            email: format!("{}@student.edu", username),
            password: "password123".to_string(),
            student_no: student_no.to_string(),
            full_name: username.to_string(),
            department: None,
            semester: None,
        })
        .unwrap()
    }

    #[test]
    fn test_open_session_defaults() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();

        assert_eq!(opened.expires_at, now + Duration::minutes(DEFAULT_SESSION_MINUTES));
        assert!(opened.qr_code.starts_with("data:image/png;base64,"));
        // Token is a parseable v4 UUID
        assert!(uuid::Uuid::parse_str(&opened.token).is_ok());
    }

    #[test]
    fn test_open_session_mints_fresh_tokens() {
        let f = fixture();
        let now = Utc::now();
        let a = f
            .engine
            .open_session(f.course_id, f.faculty_user, Some(10), now)
            .unwrap();
        let b = f
            .engine
            .open_session(f.course_id, f.faculty_user, Some(10), now)
            .unwrap();

        // No idempotency: same course, same faculty, two sessions
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_open_session_validates_course_and_profile() {
        let f = fixture();
        let now = Utc::now();

        assert!(matches!(
            f.engine.open_session(9999, f.faculty_user, None, now),
            Err(OpenSessionError::UnknownCourse)
        ));
        // A student user has no faculty profile
        assert!(matches!(
            f.engine.open_session(f.course_id, f.student_user, None, now),
            Err(OpenSessionError::NoProfile)
        ));
    }

    #[test]
    fn test_redeem_round_trip_then_already_marked() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();

        let marked = f.engine.redeem(&opened.token, f.student_user, now).unwrap();
        assert_eq!(marked.course, "Intro to CS");
        assert_eq!(marked.session_id, opened.session_id);

        assert!(matches!(
            f.engine.redeem(&opened.token, f.student_user, now),
            Err(RedeemError::AlreadyMarked)
        ));
    }

    #[test]
    fn test_redeem_unknown_token() {
        let f = fixture();
        assert!(matches!(
            f.engine.redeem("never-issued", f.student_user, Utc::now()),
            Err(RedeemError::InvalidToken)
        ));
    }

    #[test]
    fn test_redeem_no_profile_and_not_enrolled() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();

        // Faculty accounts have no student profile
        assert!(matches!(
            f.engine.redeem(&opened.token, f.faculty_user, now),
            Err(RedeemError::NoProfile)
        ));

        // Registered but not enrolled
        let outsider = register_student(&f.db, "mallory", "S999");
        assert!(matches!(
            f.engine.redeem(&opened.token, outsider, now),
            Err(RedeemError::NotEnrolled)
        ));
    }

    #[test]
    fn test_expiry_is_strict_with_no_grace() {
        let f = fixture();
        let t0 = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, Some(3), t0)
            .unwrap();

        // Exactly at expiry is already expired
        assert!(matches!(
            f.engine.redeem(&opened.token, f.student_user, t0 + Duration::minutes(3)),
            Err(RedeemError::Expired)
        ));
        // One tick before expiry still works
        f.engine
            .redeem(
                &opened.token,
                f.student_user,
                t0 + Duration::minutes(3) - Duration::seconds(1),
            )
            .unwrap();
    }

    #[test]
    fn test_deactivated_session_reports_expired() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();

        assert!(f.engine.deactivate_session(opened.session_id).unwrap());
        assert!(matches!(
            f.engine.redeem(&opened.token, f.student_user, now),
            Err(RedeemError::Expired)
        ));
        assert!(!f.engine.deactivate_session(9999).unwrap());
    }

    #[test]
    fn test_three_minute_window_timeline() {
        let f = fixture();
        let t0 = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, Some(3), t0)
            .unwrap();

        // Enrolled student at T0+1min: success
        f.engine
            .redeem(&opened.token, f.student_user, t0 + Duration::minutes(1))
            .unwrap();

        // Same student at T0+2min: already marked
        assert!(matches!(
            f.engine.redeem(&opened.token, f.student_user, t0 + Duration::minutes(2)),
            Err(RedeemError::AlreadyMarked)
        ));

        // Non-enrolled student at T0+1min: not enrolled
        let outsider = register_student(&f.db, "uma", "S500");
        assert!(matches!(
            f.engine.redeem(&opened.token, outsider, t0 + Duration::minutes(1)),
            Err(RedeemError::NotEnrolled)
        ));

        // Any attempt at T0+4min: expired, even for a fresh enrolled student
        let late = enroll_student(&f.db, f.course_id, "bob", "S600");
        assert!(matches!(
            f.engine.redeem(&opened.token, late, t0 + Duration::minutes(4)),
            Err(RedeemError::Expired)
        ));
    }

    #[test]
    fn test_concurrent_redeems_single_success() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::new();

        for _ in 0..threads {
            let engine = f.engine.clone();
            let token = opened.token.clone();
            let barrier = barrier.clone();
            let student_user = f.student_user;
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                engine.redeem(&token, student_user, now)
            }));
        }

        let mut successes = 0;
        let mut already_marked = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => successes += 1,
                Err(RedeemError::AlreadyMarked) => already_marked += 1,
                Err(e) => panic!("unexpected redeem error: {}", e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(already_marked, threads - 1);
    }

    #[test]
    fn test_roster_hides_sessions_of_other_faculty() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();
        f.engine.redeem(&opened.token, f.student_user, now).unwrap();

        let roster = f
            .engine
            .session_roster(opened.session_id, f.faculty_user)
            .unwrap()
            .unwrap();
        assert_eq!(roster.total_attendances, 1);
        assert_eq!(roster.attendances[0].student_id, "S100");

        // Another faculty gets the same answer as for a missing session
        let other_faculty = f
            .db
            .register_faculty(&NewFaculty {
                username: "prof2".to_string(),
                email: "prof2@college.edu".to_string(),
                password: "password123".to_string(),
                faculty_no: "F200".to_string(),
                full_name: "Prof Two".to_string(),
                department: None,
            })
            .unwrap();
        assert!(f
            .engine
            .session_roster(opened.session_id, other_faculty)
            .unwrap()
            .is_none());
        assert!(f.engine.session_roster(9999, f.faculty_user).unwrap().is_none());
    }

    #[test]
    fn test_student_history() {
        let f = fixture();
        let now = Utc::now();
        let opened = f
            .engine
            .open_session(f.course_id, f.faculty_user, None, now)
            .unwrap();
        f.engine.redeem(&opened.token, f.student_user, now).unwrap();

        let history = f.engine.student_history(f.student_user).unwrap().unwrap();
        assert_eq!(history.total_attendances, 1);
        assert_eq!(history.attendance_history[0].course_code, "CS101");

        // Faculty user has no student profile
        assert!(f.engine.student_history(f.faculty_user).unwrap().is_none());
    }
}
