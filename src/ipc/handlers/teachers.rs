use crate::credentials::{hash_password, verify_password};
use crate::ipc::helpers::{
    get_opt_bool, get_opt_str, get_required_str, get_string_list, require_store, require_store_mut, respond,
    teacher_view, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewTeacher, Role, TeacherPatch};
use crate::notify::{fire_and_forget, RegistrationNotice};
use serde_json::{json, Value};

fn get_role(params: &Value) -> Result<Role, HandlerErr> {
    match get_opt_str(params, "role")? {
        Some(r) => {
            Role::parse(&r).ok_or_else(|| HandlerErr::bad_params("role must be admin, principal or teacher"))
        }
        None => Ok(Role::Teacher),
    }
}

/// Absent keeps the stored value; null or blank clears it.
fn get_clearable_str(params: &Value, key: &str) -> Result<Option<Option<String>>, HandlerErr> {
    if params.get(key).is_none() {
        return Ok(None);
    }
    Ok(Some(get_opt_str(params, key)?))
}

fn list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let approved_only = get_opt_bool(params, "approvedOnly")?.unwrap_or(false);
    let teachers = require_store(state)?
        .list_teachers()?
        .iter()
        .filter(|t| !approved_only || t.approved)
        .map(teacher_view)
        .collect::<Vec<_>>();
    Ok(json!({ "teachers": teachers }))
}

fn create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let full_name = get_required_str(params, "fullName")?;
    let email = get_opt_str(params, "email")?;
    let username = match get_opt_str(params, "username")? {
        Some(u) => u,
        None => email
            .clone()
            .ok_or_else(|| HandlerErr::bad_params("missing username"))?,
    };
    let password = get_required_str(params, "password")?;
    let new = NewTeacher {
        full_name,
        username,
        email,
        role: get_role(params)?,
        subject: get_opt_str(params, "subject")?,
        department: get_opt_str(params, "department")?,
        classes: get_string_list(params, "classes")?.unwrap_or_default(),
        approved: true,
        password_hash: hash_password(&password),
    };
    let teacher = require_store_mut(state)?.insert_teacher(new)?;
    tracing::info!(teacher_id = %teacher.id, username = %teacher.username, "teacher added");
    Ok(json!({ "teacher": teacher_view(&teacher) }))
}

fn update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let patch = TeacherPatch {
        full_name: get_opt_str(params, "fullName")?,
        email: get_clearable_str(params, "email")?,
        subject: get_clearable_str(params, "subject")?,
        department: get_clearable_str(params, "department")?,
        classes: get_string_list(params, "classes")?,
        password_hash: None,
    };
    let teacher = require_store_mut(state)?.update_teacher(&id, &patch)?;
    Ok(json!({ "teacher": teacher_view(&teacher) }))
}

fn delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    require_store_mut(state)?.delete_teacher(&id)?;
    tracing::info!(teacher_id = %id, "teacher deleted");
    Ok(json!({ "deleted": true }))
}

/// Self-registration: the account is stored unapproved alongside a pending
/// approval, then the administrator is notified. Notification failures never
/// fail the registration.
fn register(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let email = get_required_str(params, "email")?;
    if !email.contains('@') {
        return Err(HandlerErr::bad_params("email must be an email address"));
    }
    let full_name = get_required_str(params, "fullName")?;
    let password = get_required_str(params, "password")?;
    if let Some(confirm) = params.get("confirmPassword").and_then(|v| v.as_str()) {
        if confirm != password {
            return Err(HandlerErr::bad_params("passwords do not match"));
        }
    }
    let new = NewTeacher {
        full_name,
        username: email.clone(),
        email: Some(email),
        role: get_role(params)?,
        subject: get_opt_str(params, "subject")?,
        department: get_opt_str(params, "department")?,
        classes: get_string_list(params, "classes")?.unwrap_or_default(),
        approved: false,
        password_hash: hash_password(&password),
    };
    let (teacher, approval) = require_store_mut(state)?.register_teacher(new)?;
    tracing::info!(profile_id = %teacher.id, role = teacher.role.as_str(), "registration pending approval");

    fire_and_forget(
        &*state.notifier,
        &RegistrationNotice {
            user_email: approval.user_email.clone(),
            full_name: approval.full_name.clone(),
            role: approval.role.as_str().to_string(),
            profile_id: approval.profile_id.clone(),
        },
    );

    Ok(json!({
        "teacher": teacher_view(&teacher),
        "approval": approval,
    }))
}

fn change_password(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let current = get_required_str(params, "currentPassword")?;
    let next = get_required_str(params, "newPassword")?;
    let store = require_store_mut(state)?;
    let Some(teacher) = store.get_teacher(&id)? else {
        return Err(HandlerErr::new("not_found", format!("teacher {} not found", id)));
    };
    if !verify_password(&teacher.password_hash, &current) {
        return Err(HandlerErr::new("invalid_password", "current password is incorrect"));
    }
    let patch = TeacherPatch {
        password_hash: Some(hash_password(&next)),
        ..TeacherPatch::default()
    };
    store.update_teacher(&id, &patch)?;
    tracing::info!(teacher_id = %id, "password changed");
    Ok(json!({ "changed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "teachers.list" => list(state, &req.params),
        "teachers.create" => create(state, &req.params),
        "teachers.update" => update(state, &req.params),
        "teachers.delete" => delete(state, &req.params),
        "teachers.register" => register(state, &req.params),
        "teachers.changePassword" => change_password(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
