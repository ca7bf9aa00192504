use super::tabular::csv_quote;
use crate::model::{AttendanceRecord, Student, Teacher};
use chrono::NaiveDate;
use std::collections::HashMap;

pub const STUDENTS_HEADER: &str = "Roll No,Student Name,Class,Section,Date Added";
pub const TEACHERS_HEADER: &str = "Name,Username,Role,Subject,Classes,Approved,Date Added";
pub const ATTENDANCE_HEADER: &str = "Date,Roll No,Student Name,Class,Present,Teacher";
pub const TEMPLATE_HEADER: &str = "Roll No,Student Name,Class,Section";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Students,
    Teachers,
    Attendance,
    All,
}

impl ExportKind {
    pub fn parse(s: &str) -> Option<ExportKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "students" => Some(ExportKind::Students),
            "teachers" => Some(ExportKind::Teachers),
            "attendance" => Some(ExportKind::Attendance),
            "all" => Some(ExportKind::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Students => "students",
            ExportKind::Teachers => "teachers",
            ExportKind::Attendance => "attendance",
            ExportKind::All => "all",
        }
    }
}

/// Everything an export may need, in display order.
pub struct ExportData<'a> {
    pub students: &'a [Student],
    pub teachers: &'a [Teacher],
    pub attendance: &'a [AttendanceRecord],
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

fn block(header: &str, rows: Vec<String>) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.to_string());
    lines.extend(rows);
    lines.join("\n")
}

pub fn students_csv(students: &[Student]) -> String {
    block(
        STUDENTS_HEADER,
        students
            .iter()
            .map(|s| {
                [
                    csv_quote(&s.roll_no),
                    csv_quote(&s.full_name),
                    csv_quote(&s.class_name),
                    csv_quote(&s.section),
                    csv_quote(&s.created_at),
                ]
                .join(",")
            })
            .collect(),
    )
}

pub fn teachers_csv(teachers: &[Teacher]) -> String {
    block(
        TEACHERS_HEADER,
        teachers
            .iter()
            .map(|t| {
                [
                    csv_quote(&t.full_name),
                    csv_quote(&t.username),
                    t.role.as_str().to_string(),
                    csv_quote(t.subject.as_deref().unwrap_or("")),
                    csv_quote(&t.classes.join(", ")),
                    yes_no(t.approved).to_string(),
                    csv_quote(&t.created_at),
                ]
                .join(",")
            })
            .collect(),
    )
}

pub fn attendance_csv(
    attendance: &[AttendanceRecord],
    students: &[Student],
    teachers: &[Teacher],
) -> String {
    let by_student = students
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect::<HashMap<_, _>>();
    let by_teacher = teachers
        .iter()
        .map(|t| (t.id.as_str(), t))
        .collect::<HashMap<_, _>>();
    block(
        ATTENDANCE_HEADER,
        attendance
            .iter()
            .map(|a| {
                let student = by_student.get(a.student_id.as_str());
                let teacher = by_teacher.get(a.teacher_id.as_str());
                [
                    csv_quote(&a.date),
                    csv_quote(student.map_or("N/A", |s| s.roll_no.as_str())),
                    csv_quote(student.map_or("N/A", |s| s.full_name.as_str())),
                    csv_quote(&a.class_name),
                    yes_no(a.present).to_string(),
                    csv_quote(teacher.map_or("N/A", |t| t.full_name.as_str())),
                ]
                .join(",")
            })
            .collect(),
    )
}

/// Title line, then the three blocks separated by blank lines.
pub fn all_csv(school_name: &str, date: NaiveDate, data: &ExportData<'_>) -> String {
    format!(
        "{} - Complete System Export - {}\n\n{}\n\n{}\n\n{}",
        school_name,
        date.format("%Y-%m-%d"),
        students_csv(data.students),
        teachers_csv(data.teachers),
        attendance_csv(data.attendance, data.students, data.teachers)
    )
}

pub fn render(kind: ExportKind, school_name: &str, date: NaiveDate, data: &ExportData<'_>) -> String {
    match kind {
        ExportKind::Students => students_csv(data.students),
        ExportKind::Teachers => teachers_csv(data.teachers),
        ExportKind::Attendance => attendance_csv(data.attendance, data.students, data.teachers),
        ExportKind::All => all_csv(school_name, date, data),
    }
}

/// Suggested download name, e.g. `students_2026-10-16.csv`.
pub fn file_name(kind: ExportKind, date: NaiveDate) -> String {
    format!("{}_{}.csv", kind.as_str(), date.format("%Y-%m-%d"))
}

/// Canonical import header with example rows and one row left blank for the
/// user to fill in.
pub fn template_csv() -> String {
    [
        TEMPLATE_HEADER,
        "JNV001,Student Name 1,8,A",
        "JNV002,Student Name 2,8,A",
        "JNV003,Student Name 3,8,B",
        ",,,",
    ]
    .join("\n")
}
