use crate::ipc::helpers::{get_required_str, require_store, require_store_mut, respond, teacher_view, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn list(state: &AppState) -> Result<Value, HandlerErr> {
    let pending = require_store(state)?.list_pending_approvals()?;
    Ok(json!({ "pending": pending }))
}

fn approve(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let profile_id = get_required_str(params, "profileId")?;
    let teacher = require_store_mut(state)?.approve(&profile_id)?;
    tracing::info!(profile_id = %profile_id, "registration approved");
    Ok(json!({ "teacher": teacher_view(&teacher) }))
}

fn reject(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let profile_id = get_required_str(params, "profileId")?;
    require_store_mut(state)?.reject(&profile_id)?;
    tracing::info!(profile_id = %profile_id, "registration rejected");
    Ok(json!({ "rejected": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "approvals.list" => list(state),
        "approvals.approve" => approve(state, &req.params),
        "approvals.reject" => reject(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
