use crate::dashboard;
use crate::guard;
use crate::ipc::error::{notice, ok, portal_err};
use crate::ipc::helpers::field;
use crate::ipc::types::{AppState, Request};
use crate::store::{Collection, Role};
use serde_json::json;

pub fn view(state: &AppState) -> serde_json::Value {
    json!(dashboard::admin_view(&state.store))
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    ok(&req.id, view(state))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    let created = state.mutate(Collection::Users, |s| {
        s.create_user(
            field(req, "username"),
            field(req, "password"),
            field(req, "name"),
            field(req, "role"),
        )
        .map(|u| (u.username.clone(), u.role))
    });
    match created {
        Ok((username, role)) => {
            tracing::info!(%username, %role, "user created");
            ok(
                &req.id,
                json!({
                    "username": username,
                    "role": role,
                    "redirect": "admin.dashboard",
                    "notice": notice("success", format!("User '{username}' created successfully.")),
                }),
            )
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    let created = state.mutate(Collection::Subjects, |s| {
        s.create_subject(field(req, "name"), field(req, "teacher_id"))
    });
    match created {
        Ok(new) => {
            let subject = new.subject;
            if let Some(w) = &new.warning {
                tracing::warn!(subject_id = %subject.id, teacher_id = %subject.teacher_id, "{w}");
            }
            tracing::info!(subject_id = %subject.id, name = %subject.name, "subject created");
            let mut result = json!({
                "subject": subject,
                "redirect": "admin.dashboard",
                "notice": notice(
                    "success",
                    format!("Subject '{}' created successfully.", subject.name),
                ),
            });
            if let Some(w) = new.warning {
                result["notice"]["warning"] = json!(w);
            }
            ok(&req.id, result)
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

fn handle_results_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    match state.mutate(Collection::Config, |s| Ok(s.toggle_publication())) {
        Ok(published) => {
            tracing::info!(published, "results publication toggled");
            let label = if published { "PUBLISHED" } else { "UNPUBLISHED" };
            ok(
                &req.id,
                json!({
                    "resultsPublished": published,
                    "redirect": "admin.dashboard",
                    "notice": notice("info", format!("Results are now {label}.")),
                }),
            )
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.dashboard" => Some(handle_dashboard(state, req)),
        "admin.users.create" => Some(handle_users_create(state, req)),
        "admin.subjects.create" => Some(handle_subjects_create(state, req)),
        "admin.results.toggle" => Some(handle_results_toggle(state, req)),
        _ => None,
    }
}
