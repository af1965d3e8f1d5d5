use crate::ipc::error::{err, ok, validation_err, validation_json};
use crate::ipc::helpers::{optional_param, required_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::registry::CommitError;
use crate::weights::{validate, AssessmentCategory, CategoryWeights};
use serde_json::json;

fn handle_categories(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let names: Vec<&str> = AssessmentCategory::ALL.iter().map(|c| c.as_str()).collect();
    ok(&req.id, json!({ "categories": names }))
}

fn handle_defaults(state: &mut AppState, req: &Request) -> serde_json::Value {
    let profile = state.config.default_weights.profile();
    ok(
        &req.id,
        json!({ "weights": profile, "total": profile.total() }),
    )
}

fn handle_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let weights: CategoryWeights = match required_param(req, "weights") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match validate(&weights) {
        Ok(total) => ok(&req.id, json!({ "valid": true, "total": total })),
        Err(e) => ok(
            &req.id,
            json!({
                "valid": false,
                "total": weights.total(),
                "error": validation_json(&e),
            }),
        ),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entry = state
        .profiles
        .entry(&class_subject_id, &state.config.default_weights);
    ok(&req.id, entry.to_json(&class_subject_id))
}

fn handle_save_draft(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weights: CategoryWeights = match required_param(req, "weights") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let total = weights.total();
    let outcome = state
        .profiles
        .save_draft(&class_subject_id, weights, &state.config.default_weights);
    let draft_validation = match outcome {
        Ok(total) => json!({ "valid": true, "total": total }),
        Err(e) => json!({ "valid": false, "total": total, "error": validation_json(&e) }),
    };

    let mut result = state
        .profiles
        .entry(&class_subject_id, &state.config.default_weights)
        .to_json(&class_subject_id);
    result["draftValidation"] = draft_validation;
    ok(&req.id, result)
}

fn handle_commit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weights: Option<CategoryWeights> = match optional_param(req, "weights") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match state
        .profiles
        .commit(&class_subject_id, weights, &state.config.default_weights)
    {
        Ok(entry) => ok(&req.id, entry.to_json(&class_subject_id)),
        Err(CommitError::NoDraft) => err(
            &req.id,
            "bad_params",
            "no weights given and no draft to commit",
            Some(json!({ "classSubjectId": class_subject_id })),
        ),
        Err(CommitError::Invalid(e)) => validation_err(&req.id, &e),
    }
}

fn handle_discard_draft(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entry = state
        .profiles
        .discard_draft(&class_subject_id, &state.config.default_weights);
    ok(&req.id, entry.to_json(&class_subject_id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "weights.categories" => Some(handle_categories(state, req)),
        "weights.defaults" => Some(handle_defaults(state, req)),
        "weights.validate" => Some(handle_validate(state, req)),
        "weights.get" => Some(handle_get(state, req)),
        "weights.saveDraft" => Some(handle_save_draft(state, req)),
        "weights.commit" => Some(handle_commit(state, req)),
        "weights.discardDraft" => Some(handle_discard_draft(state, req)),
        _ => None,
    }
}
