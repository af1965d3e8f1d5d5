use crate::calc::CalcError;
use crate::weights::ValidationError;
use serde_json::json;

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

pub fn validation_err(id: &str, e: &ValidationError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), Some(e.details()))
}

pub fn calc_err(id: &str, e: &CalcError) -> serde_json::Value {
    let mut details = json!({});
    let mut cause = e;
    if let CalcError::Student { student_id, source } = e {
        details["studentId"] = json!(student_id);
        cause = &**source;
    }
    if let CalcError::NonFinitePercentage { category, .. } = cause {
        details["category"] = json!(category);
    }
    err(id, "bad_params", e.to_string(), Some(details))
}

/// Same shape as the `error` object of a failed response, for results
/// that report a validation outcome without failing.
pub fn validation_json(e: &ValidationError) -> serde_json::Value {
    json!({
        "code": e.code(),
        "message": e.to_string(),
        "details": e.details(),
    })
}
