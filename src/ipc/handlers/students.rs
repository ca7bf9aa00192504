use crate::ipc::helpers::{
    get_opt_str, get_patch_str, get_required_str, require_store, require_store_mut, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{StudentFilter, StudentPatch, StudentRecord};
use serde_json::{json, Value};

fn record_from_params(params: &Value) -> Result<StudentRecord, HandlerErr> {
    let field = |key: &str| -> Result<String, HandlerErr> {
        Ok(get_patch_str(params, key)?.unwrap_or_default())
    };
    let record = StudentRecord {
        roll_no: field("rollNo")?,
        full_name: field("fullName")?,
        class_name: field("className")?,
        section: field("section")?,
    }
    .trimmed();
    let missing = record.missing_fields();
    if !missing.is_empty() {
        return Err(
            HandlerErr::bad_params(format!("missing {}", missing.join(", ")))
                .with_details(json!({ "missing": missing })),
        );
    }
    Ok(record)
}

fn list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let filter = StudentFilter {
        class_name: get_opt_str(params, "className")?,
        section: get_opt_str(params, "section")?,
        query: get_opt_str(params, "query")?,
    };
    let students = require_store(state)?.list_students(&filter)?;
    Ok(json!({ "students": students }))
}

fn create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let record = record_from_params(params)?;
    let store = require_store_mut(state)?;
    let mut inserted = store.insert_students(std::slice::from_ref(&record))?;
    let Some(student) = inserted.pop() else {
        return Err(HandlerErr::new("db_insert_failed", "no student stored"));
    };
    tracing::info!(roll_no = %student.roll_no, "student added");
    Ok(json!({ "student": student }))
}

fn update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let patch = StudentPatch {
        roll_no: get_patch_str(params, "rollNo")?,
        full_name: get_patch_str(params, "fullName")?,
        class_name: get_patch_str(params, "className")?,
        section: get_patch_str(params, "section")?,
    };
    let student = require_store_mut(state)?.update_student(&id, &patch)?;
    Ok(json!({ "student": student }))
}

fn delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let removed = require_store_mut(state)?.delete_student(&id)?;
    tracing::info!(student_id = %id, attendance_removed = removed, "student deleted");
    Ok(json!({ "deleted": true, "attendanceRemoved": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => list(state, &req.params),
        "students.create" => create(state, &req.params),
        "students.update" => update(state, &req.params),
        "students.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
