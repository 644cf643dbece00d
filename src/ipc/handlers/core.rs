use crate::ipc::error::{err, notice, ok};
use crate::ipc::types::{AppState, Request};
use crate::snapshot::Backend;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.snapshot.backend(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let backend = match req.params.get("backend").and_then(|v| v.as_str()) {
        Some(raw) => match raw.parse::<Backend>() {
            Ok(b) => b,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
        None => state.backend,
    };

    match state.select_workspace(&path, backend) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "backend": backend,
                "notice": notice("info", "Workspace loaded. Please log in."),
            }),
        ),
        Err(e) => err(&req.id, "workspace_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
