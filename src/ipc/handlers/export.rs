use crate::bundle::write_export_bundle;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, require_store_mut, respond, write_text_file, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{now_rfc3339, AttendanceFilter, StudentFilter};
use crate::roster::export::{file_name, render, ExportData, ExportKind};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;

fn export_csv(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let kind_raw = get_required_str(params, "kind")?;
    let kind = ExportKind::parse(&kind_raw).ok_or_else(|| {
        HandlerErr::bad_params("kind must be one of students, teachers, attendance, all")
    })?;
    let out_path = get_opt_str(params, "outPath")?;
    let school_name = state.config.school_name.clone();

    let store = require_store_mut(state)?;
    let students = store.list_students(&StudentFilter::default())?;
    let teachers = store.list_teachers()?;
    let attendance = store.list_attendance(&AttendanceFilter::default())?;
    let today = Utc::now().date_naive();
    let content = render(
        kind,
        &school_name,
        today,
        &ExportData {
            students: &students,
            teachers: &teachers,
            attendance: &attendance,
        },
    );
    let name = file_name(kind, today);

    if let Some(path) = &out_path {
        write_text_file(path, &content)?;
    }
    store.record_export(&now_rfc3339())?;
    tracing::info!(kind = kind.as_str(), file_name = %name, "csv export written");

    Ok(match out_path {
        Some(path) => json!({ "kind": kind.as_str(), "fileName": name, "path": path }),
        None => json!({ "kind": kind.as_str(), "fileName": name, "content": content }),
    })
}

fn export_bundle(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let school_name = state.config.school_name.clone();

    let store = require_store_mut(state)?;
    let students = store.list_students(&StudentFilter::default())?;
    let teachers = store.list_teachers()?;
    let attendance = store.list_attendance(&AttendanceFilter::default())?;
    let exported_at = now_rfc3339();
    let summary = write_export_bundle(
        &PathBuf::from(&out_path),
        &school_name,
        &exported_at,
        &ExportData {
            students: &students,
            teachers: &teachers,
            attendance: &attendance,
        },
    )
    .map_err(|e| {
        HandlerErr::new("export_failed", format!("{e:#}")).with_details(json!({ "path": out_path }))
    })?;
    store.record_export(&exported_at)?;
    tracing::info!(path = %out_path, entries = summary.entry_count, "export bundle written");

    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "exportedAt": exported_at,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "export.csv" => export_csv(state, &req.params),
        "export.bundle" => export_bundle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
