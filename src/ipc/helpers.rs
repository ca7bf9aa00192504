use super::error::{err, ok};
use super::types::{AppState, Request};
use crate::roster::ImportError;
use crate::model::Teacher;
use crate::store::{Store, StoreError};
use serde_json::{json, Value};
use std::path::PathBuf;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let details = match &e {
            StoreError::ConstraintViolation { roll_nos } => Some(json!({ "rollNos": roll_nos })),
            StoreError::UsernameTaken { username } => Some(json!({ "username": username })),
            StoreError::NotFound { what, id } => Some(json!({ "entity": what, "id": id })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        let details = match &e {
            ImportError::MissingColumns { missing } => Some(json!({
                "missing": missing.iter().map(|f| f.label()).collect::<Vec<_>>(),
                "accepted": 0
            })),
            ImportError::FileTooLarge { size, limit } => {
                Some(json!({ "size": size, "limit": limit }))
            }
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Render a handler outcome as the response envelope.
pub fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn require_store(state: &AppState) -> Result<&dyn Store, HandlerErr> {
    state
        .store
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_store_mut(state: &mut AppState) -> Result<&mut (dyn Store + 'static), HandlerErr> {
    state
        .store
        .as_deref_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank all read as `None`; any non-string is rejected.
pub fn get_opt_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be string or null",
            key
        ))),
    }
}

pub fn get_opt_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be boolean",
            key
        ))),
    }
}

/// A list given either as an array of strings or as one comma-separated
/// string such as `"8A, 9B"`.
pub fn get_string_list(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let items = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.split(',').map(|p| p.to_string()).collect::<Vec<_>>(),
        Some(Value::Array(a)) => {
            let mut out = Vec::with_capacity(a.len());
            for v in a {
                let Some(s) = v.as_str() else {
                    return Err(HandlerErr::bad_params(format!(
                        "{} must contain only strings",
                        key
                    )));
                };
                out.push(s.to_string());
            }
            out
        }
        Some(_) => {
            return Err(HandlerErr::bad_params(format!(
                "{} must be array or string",
                key
            )))
        }
    };
    Ok(Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    ))
}

pub fn write_text_file(path: &str, contents: &str) -> Result<(), HandlerErr> {
    let out = PathBuf::from(path);
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            HandlerErr::new("export_failed", e.to_string()).with_details(json!({ "path": path }))
        })?;
    }
    std::fs::write(&out, contents).map_err(|e| {
        HandlerErr::new("export_failed", e.to_string()).with_details(json!({ "path": path }))
    })?;
    Ok(())
}

/// Teacher as returned to callers; the password hash never leaves the store.
pub fn teacher_view(t: &Teacher) -> Value {
    json!({
        "id": t.id,
        "fullName": t.full_name,
        "username": t.username,
        "email": t.email,
        "role": t.role.as_str(),
        "subject": t.subject,
        "department": t.department,
        "classes": t.classes,
        "approved": t.approved,
        "createdAt": t.created_at,
    })
}

/// Like [`get_opt_str`] but keeps blank strings, so an edit that clears a
/// required field reaches validation instead of being ignored.
pub fn get_patch_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be string", key))),
    }
}
