use crate::ipc::helpers::{get_opt_str, get_required_str, require_store, require_store_mut, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceFilter, AttendanceMark, AttendanceSheet};
use chrono::NaiveDate;
use serde_json::{json, Value};

fn parse_date(raw: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))
}

fn parse_marks(params: &Value) -> Result<Vec<AttendanceMark>, HandlerErr> {
    let Some(items) = params.get("marks").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing marks"));
    };
    let mut marks = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let student_id = item
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HandlerErr::bad_params(format!("marks[{}].studentId missing", i)))?;
        let present = item
            .get("present")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| HandlerErr::bad_params(format!("marks[{}].present must be boolean", i)))?;
        marks.push(AttendanceMark { student_id, present });
    }
    Ok(marks)
}

fn mark(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let sheet = AttendanceSheet {
        date: parse_date(&get_required_str(params, "date")?)?,
        class_name: get_required_str(params, "className")?,
        teacher_id: get_required_str(params, "teacherId")?,
        marks: parse_marks(params)?,
    };
    let store = require_store_mut(state)?;
    if store.get_teacher(&sheet.teacher_id)?.is_none() {
        return Err(HandlerErr::new(
            "not_found",
            format!("teacher {} not found", sheet.teacher_id),
        ));
    }
    let records = store.mark_attendance(&sheet)?;
    let present = records.iter().filter(|r| r.present).count();
    tracing::info!(
        date = %sheet.date,
        class_name = %sheet.class_name,
        present,
        total = records.len(),
        "attendance marked"
    );
    Ok(json!({
        "records": records,
        "presentCount": present,
        "totalCount": records.len(),
    }))
}

fn list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let filter = AttendanceFilter {
        date: get_opt_str(params, "date")?.map(|d| parse_date(&d)).transpose()?,
        student_id: get_opt_str(params, "studentId")?,
        class_name: get_opt_str(params, "className")?,
        teacher_id: get_opt_str(params, "teacherId")?,
    };
    let records = require_store(state)?.list_attendance(&filter)?;
    Ok(json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => mark(state, &req.params),
        "attendance.list" => list(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
