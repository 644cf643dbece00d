use crate::backup;
use crate::guard;
use crate::ipc::error::{err, notice, ok, portal_err};
use crate::ipc::types::{AppState, Request};
use crate::store::Role;
use serde_json::json;
use std::path::PathBuf;

fn path_param(req: &Request, key: &str) -> Option<PathBuf> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    if state.workspace.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(out_path) = path_param(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_bundle(&state.store, &out_path) {
        Ok(summary) => {
            tracing::info!(path = %out_path.display(), "backup exported");
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "notice": notice("success", "Backup exported."),
                }),
            )
        }
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = guard::require_role(state.session.as_ref(), Role::Admin) {
        return portal_err(&req.id, &req.method, &e);
    }
    if state.workspace.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(in_path) = path_param(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    let summary = match backup::import_bundle(&in_path) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "import_failed", format!("{e:#}"), None),
    };
    if let Err(e) = state.snapshot.persist_all(&summary.store) {
        return err(&req.id, "storage_failed", format!("{e:#}"), None);
    }
    state.store = summary.store;

    // The importing admin may not exist in the restored data.
    let still_valid = state
        .session
        .as_ref()
        .is_some_and(|s| state.store.users.get(s.username()) == Some(&s.user));
    if !still_valid {
        state.session = None;
    }

    tracing::info!(path = %in_path.display(), users = state.store.users.len(), "backup imported");
    ok(
        &req.id,
        json!({
            "bundleFormatDetected": summary.bundle_format_detected,
            "sessionCleared": !still_valid,
            "notice": notice("success", "Backup restored."),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
