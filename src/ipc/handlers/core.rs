use crate::ipc::helpers::{get_opt_str, get_required_str, require_store, require_store_mut, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::BackendKind;
use serde_json::{json, Value};
use std::path::PathBuf;

fn health(state: &AppState) -> Result<Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "backend": state.store.as_ref().map(|s| s.backend().as_str()),
    }))
}

fn workspace_select(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(params, "path")?);
    let backend = match get_opt_str(params, "backend")? {
        Some(b) => BackendKind::parse(&b)
            .ok_or_else(|| HandlerErr::bad_params("backend must be sqlite or json"))?,
        None => state.config.backend,
    };
    state.open_workspace(&path, backend)?;
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "backend": backend.as_str(),
    }))
}

fn stats_get(state: &AppState) -> Result<Value, HandlerErr> {
    let stats = require_store(state)?.stats()?;
    serde_json::to_value(stats).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn data_clear(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_store_mut(state)?.clear_all()?;
    tracing::info!("all records cleared");
    Ok(json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "health" => health(state),
        "workspace.select" => workspace_select(state, &req.params),
        "stats.get" => stats_get(state),
        "data.clear" => data_clear(state),
        _ => return None,
    };
    Some(respond(req, result))
}
