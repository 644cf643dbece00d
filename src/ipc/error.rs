use serde_json::json;

use crate::error::PortalError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Flash-style message for the presentation layer to show once.
pub fn notice(severity: &str, message: impl Into<String>) -> serde_json::Value {
    json!({ "severity": severity, "message": message.into() })
}

pub fn portal_err(id: &str, method: &str, e: &PortalError) -> serde_json::Value {
    match e {
        PortalError::Unauthenticated | PortalError::Authorization { .. } => {
            tracing::warn!(method, code = e.code(), "request denied");
        }
        PortalError::Storage(_) => tracing::error!(method, error = %e, "request failed"),
        _ => tracing::info!(method, code = e.code(), "request rejected"),
    }
    let mut details = json!({ "severity": "error" });
    if let Some(r) = e.redirect() {
        details["redirect"] = json!(r);
    }
    err(id, e.code(), e.to_string(), Some(details))
}
