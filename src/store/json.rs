use super::{check_complete, BackendKind, Store, StoreError};
use crate::model::{
    now_rfc3339, roll_key, AttendanceFilter, AttendanceRecord, AttendanceSheet, NewTeacher,
    PendingApproval, Student, StudentFilter, StudentPatch, StudentRecord, Teacher, TeacherPatch,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DATA_FILE: &str = "attendd.json";

/// The whole dataset as one document, rewritten on every change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemData {
    #[serde(default)]
    students: Vec<Student>,
    #[serde(default)]
    teachers: Vec<Teacher>,
    #[serde(default)]
    attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pending_approvals: Vec<PendingApproval>,
    #[serde(default)]
    last_export: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
}

pub struct JsonStore {
    path: PathBuf,
    data: SystemData,
}

impl JsonStore {
    pub fn open(workspace: &Path) -> Result<JsonStore, StoreError> {
        let path = workspace.join(DATA_FILE);
        let data = if path.is_file() {
            let text =
                std::fs::read_to_string(&path).map_err(|e| StoreError::unavailable(e.to_string()))?;
            serde_json::from_str(&text)
                .map_err(|e| StoreError::backend(format!("{}: {}", path.display(), e)))?
        } else {
            SystemData::default()
        };
        let mut store = JsonStore { path, data };
        if !store.path.is_file() {
            let initial = store.data.clone();
            store.save(initial)?;
        }
        Ok(store)
    }

    fn save(&mut self, mut next: SystemData) -> Result<(), StoreError> {
        next.last_updated = Some(now_rfc3339());
        let text =
            serde_json::to_string_pretty(&next).map_err(|e| StoreError::backend(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| StoreError::unavailable(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::unavailable(e.to_string()))?;
        self.data = next;
        Ok(())
    }

    /// Apply `f` to a copy of the dataset and persist it only if `f`
    /// succeeds, so a failed change leaves both memory and disk untouched.
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut SystemData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = self.data.clone();
        let out = f(&mut next)?;
        self.save(next)?;
        Ok(out)
    }
}

fn username_taken(data: &SystemData, username: &str) -> bool {
    let key = username.trim().to_lowercase();
    data.teachers
        .iter()
        .any(|t| t.username.trim().to_lowercase() == key)
}

impl Store for JsonStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Json
    }

    fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .data
            .students
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.data.students.iter().find(|s| s.id == id).cloned())
    }

    fn insert_students(&mut self, records: &[StudentRecord]) -> Result<Vec<Student>, StoreError> {
        for r in records {
            check_complete(r)?;
        }
        self.mutate(|data| {
            let mut keys = data
                .students
                .iter()
                .map(|s| roll_key(&s.roll_no))
                .collect::<HashSet<_>>();
            let now = now_rfc3339();
            let mut inserted = Vec::with_capacity(records.len());
            let mut conflicts = Vec::new();
            for r in records {
                let r = r.trimmed();
                if !keys.insert(roll_key(&r.roll_no)) {
                    conflicts.push(r.roll_no);
                    continue;
                }
                inserted.push(Student {
                    id: Uuid::new_v4().to_string(),
                    roll_no: r.roll_no,
                    full_name: r.full_name,
                    class_name: r.class_name,
                    section: r.section,
                    created_at: now.clone(),
                    updated_at: now.clone(),
                });
            }
            if !conflicts.is_empty() {
                return Err(StoreError::ConstraintViolation { roll_nos: conflicts });
            }
            data.students.extend(inserted.iter().cloned());
            Ok(inserted)
        })
    }

    fn update_student(&mut self, id: &str, patch: &StudentPatch) -> Result<Student, StoreError> {
        self.mutate(|data| {
            let Some(idx) = data.students.iter().position(|s| s.id == id) else {
                return Err(StoreError::not_found("student", id));
            };
            let next = patch.apply_to(&data.students[idx]);
            check_complete(&next)?;
            let key = roll_key(&next.roll_no);
            if data
                .students
                .iter()
                .any(|s| s.id != id && roll_key(&s.roll_no) == key)
            {
                return Err(StoreError::ConstraintViolation {
                    roll_nos: vec![next.roll_no],
                });
            }
            let s = &mut data.students[idx];
            s.roll_no = next.roll_no;
            s.full_name = next.full_name;
            s.class_name = next.class_name;
            s.section = next.section;
            s.updated_at = now_rfc3339();
            Ok(s.clone())
        })
    }

    fn delete_student(&mut self, id: &str) -> Result<usize, StoreError> {
        self.mutate(|data| {
            let before = data.students.len();
            data.students.retain(|s| s.id != id);
            if data.students.len() == before {
                return Err(StoreError::not_found("student", id));
            }
            let attendance_before = data.attendance.len();
            data.attendance.retain(|a| a.student_id != id);
            Ok(attendance_before - data.attendance.len())
        })
    }

    fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        Ok(self.data.teachers.clone())
    }

    fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, StoreError> {
        Ok(self.data.teachers.iter().find(|t| t.id == id).cloned())
    }

    fn insert_teacher(&mut self, teacher: NewTeacher) -> Result<Teacher, StoreError> {
        self.mutate(|data| {
            if username_taken(data, &teacher.username) {
                return Err(StoreError::UsernameTaken {
                    username: teacher.username,
                });
            }
            let t = teacher.into_teacher(Uuid::new_v4().to_string(), now_rfc3339());
            data.teachers.push(t.clone());
            Ok(t)
        })
    }

    fn update_teacher(&mut self, id: &str, patch: &TeacherPatch) -> Result<Teacher, StoreError> {
        self.mutate(|data| {
            let Some(t) = data.teachers.iter_mut().find(|t| t.id == id) else {
                return Err(StoreError::not_found("teacher", id));
            };
            patch.apply(t);
            Ok(t.clone())
        })
    }

    fn delete_teacher(&mut self, id: &str) -> Result<(), StoreError> {
        self.mutate(|data| {
            let before = data.teachers.len();
            data.teachers.retain(|t| t.id != id);
            if data.teachers.len() == before {
                return Err(StoreError::not_found("teacher", id));
            }
            for p in data
                .pending_approvals
                .iter_mut()
                .filter(|p| p.profile_id == id)
            {
                p.processed = true;
            }
            Ok(())
        })
    }

    fn register_teacher(
        &mut self,
        teacher: NewTeacher,
    ) -> Result<(Teacher, PendingApproval), StoreError> {
        self.mutate(|data| {
            if username_taken(data, &teacher.username) {
                return Err(StoreError::UsernameTaken {
                    username: teacher.username,
                });
            }
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
            data.teachers.push(t.clone());
            data.pending_approvals.push(approval.clone());
            Ok((t, approval))
        })
    }

    fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>, StoreError> {
        // Newest first, matching the SQLite backend.
        Ok(self
            .data
            .pending_approvals
            .iter()
            .rev()
            .filter(|p| !p.processed)
            .cloned()
            .collect())
    }

    fn approve(&mut self, profile_id: &str) -> Result<Teacher, StoreError> {
        self.mutate(|data| {
            let Some(t) = data.teachers.iter_mut().find(|t| t.id == profile_id) else {
                return Err(StoreError::not_found("profile", profile_id));
            };
            t.approved = true;
            let approved = t.clone();
            for p in data
                .pending_approvals
                .iter_mut()
                .filter(|p| p.profile_id == profile_id)
            {
                p.processed = true;
            }
            Ok(approved)
        })
    }

    fn reject(&mut self, profile_id: &str) -> Result<(), StoreError> {
        self.mutate(|data| {
            let mut closed = 0usize;
            for p in data
                .pending_approvals
                .iter_mut()
                .filter(|p| p.profile_id == profile_id)
            {
                p.processed = true;
                closed += 1;
            }
            let before = data.teachers.len();
            data.teachers.retain(|t| t.id != profile_id);
            if closed == 0 && data.teachers.len() == before {
                return Err(StoreError::not_found("profile", profile_id));
            }
            Ok(())
        })
    }

    fn mark_attendance(
        &mut self,
        sheet: &AttendanceSheet,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.mutate(|data| {
            for m in &sheet.marks {
                if !data.students.iter().any(|s| s.id == m.student_id) {
                    return Err(StoreError::invalid(format!(
                        "unknown studentId {}",
                        m.student_id
                    )));
                }
            }
            data.attendance
                .retain(|a| !(a.date == sheet.date && a.class_name == sheet.class_name));
            let now = now_rfc3339();
            let records = sheet
                .marks
                .iter()
                .map(|m| AttendanceRecord {
                    id: Uuid::new_v4().to_string(),
                    student_id: m.student_id.clone(),
                    teacher_id: sheet.teacher_id.clone(),
                    date: sheet.date.clone(),
                    present: m.present,
                    class_name: sheet.class_name.clone(),
                    created_at: now.clone(),
                })
                .collect::<Vec<_>>();
            data.attendance.extend(records.iter().cloned());
            Ok(records)
        })
    }

    fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .data
            .attendance
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn last_export(&self) -> Result<Option<String>, StoreError> {
        Ok(self.data.last_export.clone())
    }

    fn record_export(&mut self, at: &str) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.last_export = Some(at.to_string());
            Ok(())
        })
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.mutate(|data| {
            *data = SystemData::default();
            Ok(())
        })
    }
}
