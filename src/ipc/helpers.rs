use crate::ipc::types::Request;

/// Form-style field read: absent or non-string values read as empty, and the
/// operation decides whether empty is acceptable.
pub fn field<'a>(req: &'a Request, key: &str) -> &'a str {
    req.params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Marks arrive either as form text or as a JSON integer.
pub fn marks_field(req: &Request) -> String {
    match req.params.get("marks") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) if n.is_i64() => n.to_string(),
        _ => String::new(),
    }
}
