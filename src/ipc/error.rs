use serde_json::json;

use crate::error::DomainError;

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

/// Map a domain outcome onto the wire. Consistency breaches are bugs, not
/// business conditions; make sure they land in the log even if the detecting
/// site did not report them.
pub fn domain_err(id: &str, e: &DomainError) -> serde_json::Value {
    if let DomainError::Consistency(msg) = e {
        tracing::error!("consistency violation surfaced to caller: {msg}");
    }
    err(id, e.code(), e.to_string(), None)
}
