//! Persistence gateway. Business logic only sees [`Store`]; which backend
//! sits behind it is decided by configuration when a workspace is opened.

mod json;
mod sqlite;

pub use json::JsonStore;
pub use sqlite::SqliteStore;

use crate::model::{
    count_classes, roll_key, AttendanceFilter, AttendanceRecord, AttendanceSheet, NewTeacher,
    PendingApproval, StudentFilter, StudentPatch, StudentRecord, Student, SystemStats, Teacher,
    TeacherPatch,
};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Json,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<BackendKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(BackendKind::Sqlite),
            "json" => Some(BackendKind::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// Roll numbers that already exist, typically written by another client
    /// between validation and insert.
    #[error("roll number already exists: {}", .roll_nos.join(", "))]
    ConstraintViolation { roll_nos: Vec<String> },

    #[error("username already exists: {username}")]
    UsernameTaken { username: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{message}")]
    Invalid { message: String },

    #[error("storage error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found(what: &'static str, id: &str) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "store_unavailable",
            StoreError::ConstraintViolation { .. } => "constraint_violation",
            StoreError::UsernameTaken { .. } => "constraint_violation",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Invalid { .. } => "bad_params",
            StoreError::Backend { .. } => "db_query_failed",
        }
    }
}

pub trait Store {
    fn backend(&self) -> BackendKind;

    /// Students in insertion order, narrowed by `filter`.
    fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError>;
    fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError>;
    /// Inserts the whole batch or nothing. Existing roll numbers fail the
    /// batch with `ConstraintViolation` naming every offending record.
    fn insert_students(&mut self, records: &[StudentRecord]) -> Result<Vec<Student>, StoreError>;
    fn update_student(&mut self, id: &str, patch: &StudentPatch) -> Result<Student, StoreError>;
    /// Deletes the student and their attendance rows together. Returns the
    /// number of attendance rows removed.
    fn delete_student(&mut self, id: &str) -> Result<usize, StoreError>;

    fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError>;
    fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, StoreError>;
    fn insert_teacher(&mut self, teacher: NewTeacher) -> Result<Teacher, StoreError>;
    fn update_teacher(&mut self, id: &str, patch: &TeacherPatch) -> Result<Teacher, StoreError>;
    fn delete_teacher(&mut self, id: &str) -> Result<(), StoreError>;

    /// Store an unapproved account together with its approval request.
    fn register_teacher(
        &mut self,
        teacher: NewTeacher,
    ) -> Result<(Teacher, PendingApproval), StoreError>;
    fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>, StoreError>;
    fn approve(&mut self, profile_id: &str) -> Result<Teacher, StoreError>;
    /// Close the request and remove the account.
    fn reject(&mut self, profile_id: &str) -> Result<(), StoreError>;

    /// Replace the stored register for the sheet's date and class.
    fn mark_attendance(
        &mut self,
        sheet: &AttendanceSheet,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn list_attendance(&self, filter: &AttendanceFilter)
        -> Result<Vec<AttendanceRecord>, StoreError>;

    fn last_export(&self) -> Result<Option<String>, StoreError>;
    fn record_export(&mut self, at: &str) -> Result<(), StoreError>;
    fn clear_all(&mut self) -> Result<(), StoreError>;

    fn roll_keys(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .list_students(&StudentFilter::default())?
            .iter()
            .map(|s| roll_key(&s.roll_no))
            .collect())
    }

    fn stats(&self) -> Result<SystemStats, StoreError> {
        let students = self.list_students(&StudentFilter::default())?;
        let teachers = self.list_teachers()?;
        Ok(SystemStats {
            total_students: students.len(),
            total_teachers: teachers.iter().filter(|t| t.approved).count(),
            total_classes: count_classes(&students),
            total_attendance_records: self.list_attendance(&AttendanceFilter::default())?.len(),
            pending_approvals: self.list_pending_approvals()?.len(),
            last_export: self.last_export()?,
            backend: self.backend().as_str().to_string(),
        })
    }
}

pub fn open_store(kind: BackendKind, workspace: &Path) -> Result<Box<dyn Store>, StoreError> {
    std::fs::create_dir_all(workspace).map_err(|e| StoreError::unavailable(e.to_string()))?;
    Ok(match kind {
        BackendKind::Sqlite => Box::new(SqliteStore::open(workspace)?),
        BackendKind::Json => Box::new(JsonStore::open(workspace)?),
    })
}

/// Rejects records with blank fields before they reach a backend.
pub(crate) fn check_complete(record: &StudentRecord) -> Result<(), StoreError> {
    let missing = record.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::invalid(format!("missing {}", missing.join(", "))))
    }
}
