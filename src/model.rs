use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The four fields a roster row must carry. Identity is `roll_no`, compared
/// case-insensitively (see [`roll_key`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub roll_no: String,
    pub full_name: String,
    pub class_name: String,
    pub section: String,
}

impl StudentRecord {
    /// Field names that are blank after trimming, in display order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.roll_no.trim().is_empty() {
            out.push("roll number");
        }
        if self.full_name.trim().is_empty() {
            out.push("name");
        }
        if self.class_name.trim().is_empty() {
            out.push("class");
        }
        if self.section.trim().is_empty() {
            out.push("section");
        }
        out
    }

    pub fn trimmed(&self) -> StudentRecord {
        StudentRecord {
            roll_no: self.roll_no.trim().to_string(),
            full_name: self.full_name.trim().to_string(),
            class_name: self.class_name.trim().to_string(),
            section: self.section.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub roll_no: String,
    pub full_name: String,
    pub class_name: String,
    pub section: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial edit applied by `students.update`; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub roll_no: Option<String>,
    pub full_name: Option<String>,
    pub class_name: Option<String>,
    pub section: Option<String>,
}

impl StudentPatch {
    pub fn apply_to(&self, student: &Student) -> StudentRecord {
        StudentRecord {
            roll_no: self.roll_no.clone().unwrap_or_else(|| student.roll_no.clone()),
            full_name: self
                .full_name
                .clone()
                .unwrap_or_else(|| student.full_name.clone()),
            class_name: self
                .class_name
                .clone()
                .unwrap_or_else(|| student.class_name.clone()),
            section: self.section.clone().unwrap_or_else(|| student.section.clone()),
        }
        .trimmed()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub query: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, s: &Student) -> bool {
        if let Some(c) = self.class_name.as_deref() {
            if !s.class_name.eq_ignore_ascii_case(c.trim()) {
                return false;
            }
        }
        if let Some(sec) = self.section.as_deref() {
            if !s.section.eq_ignore_ascii_case(sec.trim()) {
                return false;
            }
        }
        if let Some(q) = self.query.as_deref() {
            let q = q.trim().to_lowercase();
            if q.is_empty() {
                return true;
            }
            return s.full_name.to_lowercase().contains(&q)
                || s.roll_no.to_lowercase().contains(&q)
                || s.class_name.to_lowercase().contains(&q)
                || s.section.to_lowercase().contains(&q);
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Principal,
    Teacher,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "principal" => Some(Role::Principal),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Principal => "principal",
            Role::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub full_name: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub approved: bool,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub full_name: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub subject: Option<String>,
    pub department: Option<String>,
    pub classes: Vec<String>,
    pub approved: bool,
    pub password_hash: String,
}

impl NewTeacher {
    pub fn into_teacher(self, id: String, created_at: String) -> Teacher {
        Teacher {
            id,
            full_name: self.full_name,
            username: self.username,
            email: self.email,
            role: self.role,
            subject: self.subject,
            department: self.department,
            classes: self.classes,
            approved: self.approved,
            password_hash: self.password_hash,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeacherPatch {
    pub full_name: Option<String>,
    pub email: Option<Option<String>>,
    pub subject: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub classes: Option<Vec<String>>,
    pub password_hash: Option<String>,
}

impl TeacherPatch {
    pub fn apply(&self, t: &mut Teacher) {
        if let Some(v) = &self.full_name {
            t.full_name = v.clone();
        }
        if let Some(v) = &self.email {
            t.email = v.clone();
        }
        if let Some(v) = &self.subject {
            t.subject = v.clone();
        }
        if let Some(v) = &self.department {
            t.department = v.clone();
        }
        if let Some(v) = &self.classes {
            t.classes = v.clone();
        }
        if let Some(v) = &self.password_hash {
            t.password_hash = v.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub date: String,
    pub present: bool,
    pub class_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub student_id: String,
    pub present: bool,
}

/// One class's register for one day. Marking replaces whatever was stored
/// for the same date and class.
#[derive(Debug, Clone)]
pub struct AttendanceSheet {
    pub date: String,
    pub class_name: String,
    pub teacher_id: String,
    pub marks: Vec<AttendanceMark>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub date: Option<String>,
    pub student_id: Option<String>,
    pub class_name: Option<String>,
    pub teacher_id: Option<String>,
}

impl AttendanceFilter {
    pub fn matches(&self, a: &AttendanceRecord) -> bool {
        self.date.as_deref().map_or(true, |d| a.date == d)
            && self.student_id.as_deref().map_or(true, |s| a.student_id == s)
            && self.class_name.as_deref().map_or(true, |c| a.class_name == c)
            && self.teacher_id.as_deref().map_or(true, |t| a.teacher_id == t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    pub id: String,
    pub profile_id: String,
    pub user_email: String,
    pub full_name: String,
    pub role: Role,
    pub requested_at: String,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_students: usize,
    pub total_teachers: usize,
    pub total_classes: usize,
    pub total_attendance_records: usize,
    pub pending_approvals: usize,
    pub last_export: Option<String>,
    pub backend: String,
}

/// Case-insensitive identity key for a roll number.
pub fn roll_key(roll_no: &str) -> String {
    roll_no.trim().to_lowercase()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Distinct `class-section` pairs; the dashboard counts classes this way.
pub fn count_classes(students: &[Student]) -> usize {
    let mut seen = std::collections::HashSet::new();
    for s in students {
        seen.insert(format!(
            "{}-{}",
            s.class_name.to_lowercase(),
            s.section.to_lowercase()
        ));
    }
    seen.len()
}
