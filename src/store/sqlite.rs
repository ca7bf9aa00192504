use super::{check_complete, BackendKind, Store, StoreError};
use crate::model::{
    now_rfc3339, roll_key, AttendanceFilter, AttendanceRecord, AttendanceSheet, NewTeacher,
    PendingApproval, Role, Student, StudentFilter, StudentPatch, StudentRecord, Teacher,
    TeacherPatch,
};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "attendd.sqlite3";

pub struct SqliteStore {
    conn: Connection,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(f, _) = &e {
            match f.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::ReadOnly
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied => return StoreError::unavailable(e.to_string()),
                _ => {}
            }
        }
        StoreError::backend(e.to_string())
    }
}

fn is_constraint(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation)
}

const STUDENT_COLS: &str =
    "id, roll_no, full_name, class_name, section, created_at, updated_at";
const TEACHER_COLS: &str = "id, full_name, username, email, role, subject, department, classes, approved, password_hash, created_at";
const ATTENDANCE_COLS: &str = "id, student_id, teacher_id, date, present, class_name, created_at";
const APPROVAL_COLS: &str = "id, profile_id, user_email, full_name, role, requested_at, processed";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        roll_no: r.get(1)?,
        full_name: r.get(2)?,
        class_name: r.get(3)?,
        section: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

fn role_from_text(s: &str) -> Role {
    Role::parse(s).unwrap_or(Role::Teacher)
}

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    let role: String = r.get(4)?;
    let classes: String = r.get(7)?;
    Ok(Teacher {
        id: r.get(0)?,
        full_name: r.get(1)?,
        username: r.get(2)?,
        email: r.get(3)?,
        role: role_from_text(&role),
        subject: r.get(5)?,
        department: r.get(6)?,
        classes: serde_json::from_str(&classes).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
        })?,
        approved: r.get::<_, i64>(8)? != 0,
        password_hash: r.get(9)?,
        created_at: r.get(10)?,
    })
}

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        teacher_id: r.get(2)?,
        date: r.get(3)?,
        present: r.get::<_, i64>(4)? != 0,
        class_name: r.get(5)?,
        created_at: r.get(6)?,
    })
}

fn approval_from_row(r: &Row<'_>) -> rusqlite::Result<PendingApproval> {
    let role: String = r.get(4)?;
    Ok(PendingApproval {
        id: r.get(0)?,
        profile_id: r.get(1)?,
        user_email: r.get(2)?,
        full_name: r.get(3)?,
        role: role_from_text(&role),
        requested_at: r.get(5)?,
        processed: r.get::<_, i64>(6)? != 0,
    })
}

fn classes_json(classes: &[String]) -> String {
    serde_json::to_string(classes).unwrap_or_else(|_| "[]".to_string())
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> Result<SqliteStore, StoreError> {
        let conn = Connection::open(workspace.join(DB_FILE))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;
        Ok(SqliteStore { conn })
    }

    fn insert_teacher_row(conn: &Connection, t: &Teacher) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO teachers(id, full_name, username, username_key, email, role, subject, department, classes, approved, password_hash, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &t.id,
                &t.full_name,
                &t.username,
                t.username.trim().to_lowercase(),
                t.email.as_deref(),
                t.role.as_str(),
                t.subject.as_deref(),
                t.department.as_deref(),
                classes_json(&t.classes),
                if t.approved { 1 } else { 0 },
                &t.password_hash,
                &t.created_at,
            ),
        )
        .map_err(|e| {
            if is_constraint(&e) {
                StoreError::UsernameTaken {
                    username: t.username.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            roll_no TEXT NOT NULL,
            roll_key TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            section TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            username TEXT NOT NULL,
            username_key TEXT NOT NULL UNIQUE,
            email TEXT,
            role TEXT NOT NULL,
            subject TEXT,
            department TEXT,
            classes TEXT NOT NULL DEFAULT '[]',
            approved INTEGER NOT NULL DEFAULT 0,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            date TEXT NOT NULL,
            present INTEGER NOT NULL,
            class_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date_class ON attendance_records(date, class_name)",
        [],
    )?;

    // No foreign key on profile_id: rejecting a registration deletes the
    // account but keeps the processed request.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pending_approvals(
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pending_approvals_profile ON pending_approvals(profile_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STUDENT_COLS} FROM students ORDER BY sort_order"
        ))?;
        let rows = stmt
            .query_map([], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().filter(|s| filter.matches(s)).collect())
    }

    fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
                [id],
                student_from_row,
            )
            .optional()?)
    }

    fn insert_students(&mut self, records: &[StudentRecord]) -> Result<Vec<Student>, StoreError> {
        for r in records {
            check_complete(r)?;
        }
        let tx = self.conn.transaction()?;
        let mut next_sort: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
            [],
            |r| r.get(0),
        )?;
        let now = now_rfc3339();
        let mut inserted = Vec::with_capacity(records.len());
        let mut conflicts = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO students(id, roll_no, roll_key, full_name, class_name, section, sort_order, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for r in records {
                let r = r.trimmed();
                let id = Uuid::new_v4().to_string();
                match stmt.execute((
                    &id,
                    &r.roll_no,
                    roll_key(&r.roll_no),
                    &r.full_name,
                    &r.class_name,
                    &r.section,
                    next_sort,
                    &now,
                    &now,
                )) {
                    Ok(_) => inserted.push(Student {
                        id,
                        roll_no: r.roll_no,
                        full_name: r.full_name,
                        class_name: r.class_name,
                        section: r.section,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    }),
                    Err(e) if is_constraint(&e) => conflicts.push(r.roll_no),
                    Err(e) => return Err(e.into()),
                }
                next_sort += 1;
            }
        }
        if !conflicts.is_empty() {
            tx.rollback()?;
            return Err(StoreError::ConstraintViolation { roll_nos: conflicts });
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn update_student(&mut self, id: &str, patch: &StudentPatch) -> Result<Student, StoreError> {
        let Some(current) = self.get_student(id)? else {
            return Err(StoreError::not_found("student", id));
        };
        let next = patch.apply_to(&current);
        check_complete(&next)?;
        let now = now_rfc3339();
        self.conn
            .execute(
                "UPDATE students
                 SET roll_no = ?, roll_key = ?, full_name = ?, class_name = ?, section = ?, updated_at = ?
                 WHERE id = ?",
                (
                    &next.roll_no,
                    roll_key(&next.roll_no),
                    &next.full_name,
                    &next.class_name,
                    &next.section,
                    &now,
                    id,
                ),
            )
            .map_err(|e| {
                if is_constraint(&e) {
                    StoreError::ConstraintViolation {
                        roll_nos: vec![next.roll_no.clone()],
                    }
                } else {
                    e.into()
                }
            })?;
        Ok(Student {
            id: current.id,
            roll_no: next.roll_no,
            full_name: next.full_name,
            class_name: next.class_name,
            section: next.section,
            created_at: current.created_at,
            updated_at: now,
        })
    }

    fn delete_student(&mut self, id: &str) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM attendance_records WHERE student_id = ?", [id])?;
        let changed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        if changed == 0 {
            tx.rollback()?;
            return Err(StoreError::not_found("student", id));
        }
        tx.commit()?;
        Ok(removed)
    }

    fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TEACHER_COLS} FROM teachers ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], teacher_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TEACHER_COLS} FROM teachers WHERE id = ?"),
                [id],
                teacher_from_row,
            )
            .optional()?)
    }

    fn insert_teacher(&mut self, teacher: NewTeacher) -> Result<Teacher, StoreError> {
        let t = teacher.into_teacher(Uuid::new_v4().to_string(), now_rfc3339());
        Self::insert_teacher_row(&self.conn, &t)?;
        Ok(t)
    }

    fn update_teacher(&mut self, id: &str, patch: &TeacherPatch) -> Result<Teacher, StoreError> {
        let Some(mut t) = self.get_teacher(id)? else {
            return Err(StoreError::not_found("teacher", id));
        };
        patch.apply(&mut t);
        self.conn.execute(
            "UPDATE teachers
             SET full_name = ?, email = ?, subject = ?, department = ?, classes = ?, password_hash = ?
             WHERE id = ?",
            (
                &t.full_name,
                t.email.as_deref(),
                t.subject.as_deref(),
                t.department.as_deref(),
                classes_json(&t.classes),
                &t.password_hash,
                id,
            ),
        )?;
        Ok(t)
    }

    fn delete_teacher(&mut self, id: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute("DELETE FROM teachers WHERE id = ?", [id])?;
        if changed == 0 {
            tx.rollback()?;
            return Err(StoreError::not_found("teacher", id));
        }
        // An open request for a deleted account can never be approved.
        tx.execute(
            "UPDATE pending_approvals SET processed = 1 WHERE profile_id = ?",
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn register_teacher(
        &mut self,
        teacher: NewTeacher,
    ) -> Result<(Teacher, PendingApproval), StoreError> {
        let now = now_rfc3339();
        let mut t = teacher.into_teacher(Uuid::new_v4().to_string(), now.clone());
        t.approved = false;
        let approval = PendingApproval {
            id: Uuid::new_v4().to_string(),
            profile_id: t.id.clone(),
            user_email: t.email.clone().unwrap_or_default(),
            full_name: t.full_name.clone(),
            role: t.role,
            requested_at: now,
            processed: false,
        };
        let tx = self.conn.transaction()?;
        Self::insert_teacher_row(&tx, &t)?;
        tx.execute(
            &format!("INSERT INTO pending_approvals({APPROVAL_COLS}) VALUES(?, ?, ?, ?, ?, ?, 0)"),
            (
                &approval.id,
                &approval.profile_id,
                &approval.user_email,
                &approval.full_name,
                approval.role.as_str(),
                &approval.requested_at,
            ),
        )?;
        tx.commit()?;
        Ok((t, approval))
    }

    fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPROVAL_COLS} FROM pending_approvals WHERE processed = 0 ORDER BY requested_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([], approval_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn approve(&mut self, profile_id: &str) -> Result<Teacher, StoreError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute("UPDATE teachers SET approved = 1 WHERE id = ?", [profile_id])?;
        if changed == 0 {
            tx.rollback()?;
            return Err(StoreError::not_found("profile", profile_id));
        }
        tx.execute(
            "UPDATE pending_approvals SET processed = 1 WHERE profile_id = ?",
            [profile_id],
        )?;
        tx.commit()?;
        self.get_teacher(profile_id)?
            .ok_or_else(|| StoreError::not_found("profile", profile_id))
    }

    fn reject(&mut self, profile_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let closed = tx.execute(
            "UPDATE pending_approvals SET processed = 1 WHERE profile_id = ?",
            [profile_id],
        )?;
        let removed = tx.execute("DELETE FROM teachers WHERE id = ?", [profile_id])?;
        if closed == 0 && removed == 0 {
            tx.rollback()?;
            return Err(StoreError::not_found("profile", profile_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn mark_attendance(
        &mut self,
        sheet: &AttendanceSheet,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let tx = self.conn.transaction()?;
        for m in &sheet.marks {
            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM students WHERE id = ?", [&m.student_id], |r| {
                    r.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::invalid(format!(
                    "unknown studentId {}",
                    m.student_id
                )));
            }
        }
        tx.execute(
            "DELETE FROM attendance_records WHERE date = ? AND class_name = ?",
            (&sheet.date, &sheet.class_name),
        )?;
        let now = now_rfc3339();
        let mut out = Vec::with_capacity(sheet.marks.len());
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO attendance_records({ATTENDANCE_COLS}) VALUES(?, ?, ?, ?, ?, ?, ?)"
            ))?;
            for m in &sheet.marks {
                let rec = AttendanceRecord {
                    id: Uuid::new_v4().to_string(),
                    student_id: m.student_id.clone(),
                    teacher_id: sheet.teacher_id.clone(),
                    date: sheet.date.clone(),
                    present: m.present,
                    class_name: sheet.class_name.clone(),
                    created_at: now.clone(),
                };
                stmt.execute((
                    &rec.id,
                    &rec.student_id,
                    &rec.teacher_id,
                    &rec.date,
                    if rec.present { 1 } else { 0 },
                    &rec.class_name,
                    &rec.created_at,
                ))?;
                out.push(rec);
            }
        }
        tx.commit()?;
        Ok(out)
    }

    fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLS} FROM attendance_records ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], attendance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().filter(|a| filter.matches(a)).collect())
    }

    fn last_export(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'last_export'", [], |r| {
                r.get(0)
            })
            .optional()?)
    }

    fn record_export(&mut self, at: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO meta(key, value) VALUES('last_export', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [at],
        )?;
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for table in [
            "attendance_records",
            "pending_approvals",
            "students",
            "teachers",
            "meta",
        ] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_classes_column_is_reported_not_emptied() {
        let ws = std::env::temp_dir().join(format!("attendd-sqlite-classes-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&ws).expect("create temp dir");
        let mut store = SqliteStore::open(&ws).expect("open");
        let teacher = store
            .insert_teacher(NewTeacher {
                full_name: "Rao".into(),
                username: "rao".into(),
                email: None,
                role: Role::Teacher,
                subject: None,
                department: None,
                classes: vec!["8-A".into()],
                approved: true,
                password_hash: "salt$hash".into(),
            })
            .expect("insert");
        assert_eq!(
            store.get_teacher(&teacher.id).expect("get").map(|t| t.classes),
            Some(vec!["8-A".to_string()])
        );

        store
            .conn
            .execute(
                "UPDATE teachers SET classes = 'not json' WHERE id = ?",
                [&teacher.id],
            )
            .expect("corrupt row");
        let err = store.list_teachers().expect_err("corrupt classes");
        assert_eq!(err.code(), "db_query_failed");
        assert!(store.get_teacher(&teacher.id).is_err());
    }
}
