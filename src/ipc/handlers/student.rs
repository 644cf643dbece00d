use crate::dashboard::{self, StudentView};
use crate::guard::{self, Session};
use crate::ipc::error::{notice, ok, portal_err};
use crate::ipc::types::{AppState, Request};
use crate::store::Role;
use serde_json::json;

pub fn view(state: &AppState, session: &Session) -> serde_json::Value {
    let v = dashboard::student_view(&state.store, session);
    let mut out = json!(v);
    if v == StudentView::Unpublished {
        out["notice"] = notice("info", "Results have not been published yet.");
    }
    out
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    match guard::require_role(state.session.as_ref(), Role::Student) {
        Ok(session) => ok(&req.id, view(state, session)),
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

/// Printable copy of the report card.
fn handle_report_download(state: &mut AppState, req: &Request) -> serde_json::Value {
    match guard::require_role(state.session.as_ref(), Role::Student) {
        Ok(session) => {
            let mut out = view(state, session);
            out["student"] = json!({
                "username": session.username(),
                "name": session.user.name,
            });
            out["generatedAt"] = json!(chrono::Utc::now().to_rfc3339());
            ok(&req.id, out)
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.dashboard" => Some(handle_dashboard(state, req)),
        "student.report.download" => Some(handle_report_download(state, req)),
        _ => None,
    }
}
