use crate::bands::GradeBander;
use crate::calc::{self, CategoryPercentage, CategoryPercentages, ScoreRecord};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{required_param, resolve_profile};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_records(req: &Request) -> Result<Vec<ScoreRecord>, serde_json::Value> {
    let records: Vec<ScoreRecord> = required_param(req, "records")?;
    for (i, r) in records.iter().enumerate() {
        if !r.score.is_finite() || !r.max_score.is_finite() {
            return Err(err(
                &req.id,
                "bad_params",
                "score and maxScore must be finite numbers",
                Some(json!({ "index": i, "studentId": r.student_id })),
            ));
        }
    }
    Ok(records)
}

fn handle_aggregate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let records = match parse_records(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let categories: Vec<CategoryPercentage> = match calc::aggregate(&records) {
        Ok(v) => v.into_values().collect(),
        Err(e) => return calc_err(&req.id, &e),
    };
    ok(&req.id, json!({ "categories": categories }))
}

fn handle_compute_overall(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows: Vec<CategoryPercentage> = match required_param(req, "categories") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let profile = match resolve_profile(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut categories = CategoryPercentages::new();
    for row in rows {
        if !row.percentage.is_finite() {
            return err(
                &req.id,
                "bad_params",
                "category percentage must be a finite number",
                Some(json!({ "category": row.category })),
            );
        }
        let category = row.category;
        if categories.insert(category, row).is_some() {
            return err(
                &req.id,
                "bad_params",
                "duplicate category",
                Some(json!({ "category": category })),
            );
        }
    }

    let overall = match calc::compute_overall(&categories, &profile) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, &e),
    };
    let overall = calc::band_overall(overall, &state.config.grade_bands);
    ok(&req.id, json!(overall))
}

fn handle_band(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(percentage) = req.params.get("percentage").and_then(|v| v.as_f64()) else {
        return err(
            &req.id,
            "bad_params",
            "percentage must be a number; ungraded results have no band",
            None,
        );
    };
    ok(
        &req.id,
        json!({ "percentage": percentage, "letter": state.config.grade_bands.band(percentage) }),
    )
}

fn handle_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let records = match parse_records(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let profile = match resolve_profile(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calc::grade_student(&records, &profile, &state.config.grade_bands) {
        Ok(overall) => ok(&req.id, json!(overall)),
        Err(e) => calc_err(&req.id, &e),
    }
}

fn handle_class_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let records = match parse_records(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let profile = match resolve_profile(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calc::grade_class_subject(&records, &profile, &state.config.grade_bands) {
        Ok(graded) => ok(&req.id, json!(graded)),
        Err(e) => calc_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.aggregate" => Some(handle_aggregate(state, req)),
        "grades.computeOverall" => Some(handle_compute_overall(state, req)),
        "grades.band" => Some(handle_band(state, req)),
        "grades.student" => Some(handle_student(state, req)),
        "grades.classSubject" => Some(handle_class_subject(state, req)),
        _ => None,
    }
}
