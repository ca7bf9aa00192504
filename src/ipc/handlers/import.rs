use crate::ipc::helpers::{
    get_opt_str, get_required_str, require_store_mut, respond, write_text_file, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::roster::export::template_csv;
use crate::roster::{read_upload, validate_grid, FileKind, Grid, ImportResult};
use crate::store::{Store, StoreError};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;

pub const TEMPLATE_FILE_NAME: &str = "student_list_template.csv";

fn load(state: &AppState, params: &Value) -> Result<(FileKind, Grid), HandlerErr> {
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    Ok(read_upload(&in_path, state.config.max_upload_bytes)?)
}

fn summary(kind: FileKind, grid: &Grid, result: &ImportResult, accepted: Value) -> Value {
    json!({
        "fileKind": kind.as_str(),
        "rowsRead": grid.len().saturating_sub(1),
        "acceptedCount": result.accepted.len(),
        "accepted": accepted,
        "duplicates": result.duplicates,
        "errors": result.errors,
    })
}

/// Validate without persisting. Works without a workspace, in which case
/// only in-file duplicates are reported.
fn preview(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let (kind, grid) = load(state, params)?;
    let existing = match state.store.as_deref() {
        Some(store) => store.roll_keys()?,
        None => HashSet::new(),
    };
    let result = validate_grid(&existing, &grid)?;
    let accepted = serde_json::to_value(&result.accepted)
        .map_err(|e| HandlerErr::new("parse_failed", e.to_string()))?;
    Ok(summary(kind, &grid, &result, accepted))
}

fn import(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let (kind, grid) = load(state, params)?;
    let store = require_store_mut(state)?;
    let mut result = validate_grid(&store.roll_keys()?, &grid)?;
    let stored = persist_accepted(store, &mut result)?;

    tracing::info!(
        file_kind = kind.as_str(),
        accepted = stored.len(),
        duplicates = result.duplicates.len(),
        errors = result.errors.len(),
        "roster import finished"
    );
    Ok(summary(kind, &grid, &result, json!(stored)))
}

/// Insert the accepted records. Rows the store refuses as already present
/// become `existing` duplicates and the remainder is retried; each pass
/// shrinks `accepted`, so the loop ends.
fn persist_accepted(
    store: &mut dyn Store,
    result: &mut ImportResult,
) -> Result<Vec<Student>, StoreError> {
    loop {
        if result.accepted.is_empty() {
            return Ok(Vec::new());
        }
        match store.insert_students(&result.accepted) {
            Ok(stored) => return Ok(stored),
            Err(StoreError::ConstraintViolation { roll_nos }) => {
                if result.reclassify_existing(&roll_nos) == 0 {
                    return Err(StoreError::ConstraintViolation { roll_nos });
                }
                tracing::debug!(
                    conflicts = roll_nos.len(),
                    "retrying import without already stored rolls"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

fn template(params: &Value) -> Result<Value, HandlerErr> {
    let content = template_csv();
    match get_opt_str(params, "outPath")? {
        Some(out_path) => {
            write_text_file(&out_path, &content)?;
            Ok(json!({ "ok": true, "path": out_path }))
        }
        None => Ok(json!({ "fileName": TEMPLATE_FILE_NAME, "content": content })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.previewImport" => preview(state, &req.params),
        "students.import" => import(state, &req.params),
        "students.template" => template(&req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
