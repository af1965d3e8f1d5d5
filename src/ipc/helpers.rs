use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::weights::{CategoryWeights, WeightProfile};
use serde::de::DeserializeOwned;
use serde_json::json;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let v = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    if v.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        ));
    }
    Ok(v)
}

pub fn optional_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("invalid {}: {}", key, e),
                None,
            )
        }),
    }
}

pub fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    optional_param(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// The profile a grading call runs against: explicit `weights` when the
/// caller supplies its own committed profile, else the registry's
/// committed profile for `classSubjectId`. Drafts are never used.
pub fn resolve_profile(state: &mut AppState, req: &Request) -> Result<WeightProfile, serde_json::Value> {
    if let Some(weights) = optional_param::<CategoryWeights>(req, "weights")? {
        return WeightProfile::commit(weights).map_err(|e| {
            err(
                &req.id,
                "invalid_profile",
                e.to_string(),
                Some(json!({ "reason": e.code(), "validation": e.details() })),
            )
        });
    }
    if req.params.get("classSubjectId").is_none() {
        return Err(err(
            &req.id,
            "bad_params",
            "missing weights or classSubjectId",
            None,
        ));
    }
    let class_subject_id = required_str(req, "classSubjectId")?;
    Ok(state
        .profiles
        .entry(&class_subject_id, &state.config.default_weights)
        .committed
        .clone())
}
