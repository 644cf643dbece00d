use crate::dashboard;
use crate::guard::{self, Session};
use crate::ipc::error::{notice, ok, portal_err};
use crate::ipc::helpers::{field, marks_field};
use crate::ipc::types::{AppState, Request};
use crate::store::{Collection, Role};
use serde_json::json;

pub fn view(state: &AppState, session: &Session) -> serde_json::Value {
    json!(dashboard::teacher_view(&state.store, session))
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    match guard::require_role(state.session.as_ref(), Role::Teacher) {
        Ok(session) => ok(&req.id, view(state, session)),
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

fn handle_marks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match guard::require_role(state.session.as_ref(), Role::Teacher) {
        Ok(s) => s.clone(),
        Err(e) => return portal_err(&req.id, &req.method, &e),
    };
    let student_id = field(req, "student_id");
    let subject_id = field(req, "subject_id");
    let raw = marks_field(req);

    let recorded = state.mutate(Collection::Marks, |s| {
        s.record_mark(&session, student_id, subject_id, &raw)
    });
    match recorded {
        Ok(r) => {
            tracing::info!(
                teacher = %session.username(),
                student_id,
                subject_id,
                marks = r.marks,
                "marks recorded"
            );
            ok(
                &req.id,
                json!({
                    "studentId": student_id,
                    "subjectId": subject_id,
                    "subject": r.subject_name,
                    "marks": r.marks,
                    "redirect": "teacher.dashboard",
                    "notice": notice("success", format!("Updated marks for {}.", r.student_name)),
                }),
            )
        }
        Err(e) => portal_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teacher.dashboard" => Some(handle_dashboard(state, req)),
        "teacher.marks.update" => Some(handle_marks_update(state, req)),
        _ => None,
    }
}
