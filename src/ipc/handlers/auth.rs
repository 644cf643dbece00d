use crate::dashboard::UserSummary;
use crate::guard::{self, Session};
use crate::ipc::error::{notice, ok, portal_err};
use crate::ipc::handlers::{admin, student, teacher};
use crate::ipc::helpers::field;
use crate::ipc::types::{AppState, Request};
use crate::store::{Collection, Role};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match state
        .store
        .authenticate(field(req, "username"), field(req, "password"))
    {
        Ok(u) => u,
        Err(e) => return portal_err(&req.id, &req.method, &e),
    };
    tracing::info!(username = %user.username, role = %user.role, "login");
    let welcome = format!("Welcome back, {}!", user.name);
    let landing = user.role.landing();
    let summary = UserSummary::from(&user);
    state.session = Some(Session::new(user));
    ok(
        &req.id,
        json!({
            "user": summary,
            "redirect": landing,
            "notice": notice("success", welcome),
        }),
    )
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(s) = state.session.take() {
        tracing::info!(username = %s.username(), "logout");
    }
    ok(
        &req.id,
        json!({
            "redirect": "auth.login",
            "notice": notice("info", "You have been logged out."),
        }),
    )
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (username, password, name) = (
        field(req, "username"),
        field(req, "password"),
        field(req, "name"),
    );
    let created = state.mutate(Collection::Users, |s| {
        s.signup(username, password, name).map(|u| u.username.clone())
    });
    match created {
        Ok(username) => {
            tracing::info!(%username, "student signed up");
            ok(
                &req.id,
                json!({
                    "username": username,
                    "redirect": "auth.login",
                    "notice": notice("success", "Account created. Please log in."),
                }),
            )
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

fn handle_session_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = state.session.as_ref().map(|s| UserSummary::from(&s.user));
    ok(&req.id, json!({ "user": user }))
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match guard::require_login(state.session.as_ref()) {
        Ok(s) => s,
        Err(e) => return portal_err(&req.id, &req.method, &e),
    };
    let role = session.role();
    let view = match role {
        Role::Admin => admin::view(state),
        Role::Teacher => teacher::view(state, session),
        Role::Student => student::view(state, session),
    };
    ok(
        &req.id,
        json!({
            "role": role,
            "redirect": role.landing(),
            "view": view,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.signup" => Some(handle_signup(state, req)),
        "session.current" => Some(handle_session_current(state, req)),
        "dashboard" => Some(handle_dashboard(state, req)),
        _ => None,
    }
}
