//! Evaluation submission endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::CurrentClinician;
use crate::services::intake::{self, EvaluationSubmission};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SubmitEvaluationResponse {
    pub success: bool,
    pub message: String,
    pub evaluation_id: i64,
    /// Assignments this verdict brought to completion
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_assignments: Vec<i64>,
}

/// POST /api/submit-evaluation
///
/// **Request:** `{"image_id": 12, "is_real": true, "confidence": 4}`
///
/// **Errors:**
/// - 400: missing or mistyped fields, confidence outside 1..=5, image
///   already evaluated
/// - 403: no active assignment covers the image
/// - 404: unknown image
pub async fn submit_evaluation(
    State(state): State<AppState>,
    CurrentClinician(clinician): CurrentClinician,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SubmitEvaluationResponse>> {
    let Json(body) = payload.map_err(|_| ApiError::bad_request("Invalid request"))?;
    let submission = parse_submission(&body)?;

    let recorded = intake::record_evaluation(&state.db, clinician.id, submission).await?;

    Ok(Json(SubmitEvaluationResponse {
        success: true,
        message: "Evaluation submitted successfully".to_string(),
        evaluation_id: recorded.evaluation.id,
        completed_assignments: recorded.completed_assignments,
    }))
}

/// Presence and type checks; range checks belong to intake
fn parse_submission(body: &Value) -> Result<EvaluationSubmission, ApiError> {
    let field = |name: &str| body.get(name).filter(|value| !value.is_null());

    for name in ["image_id", "is_real", "confidence"] {
        if field(name).is_none() {
            debug!("Evaluation rejected: '{}' missing", name);
            return Err(ApiError::invalid_field(name, "Missing required fields"));
        }
    }

    let image_id = field("image_id")
        .and_then(as_integer)
        .ok_or_else(|| ApiError::invalid_field("image_id", "Image id must be an integer"))?;
    let is_real = field("is_real")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::invalid_field("is_real", "Verdict must be true or false"))?;
    let confidence = field("confidence")
        .and_then(as_integer)
        .ok_or_else(|| ApiError::invalid_field("confidence", "Confidence must be an integer"))?;

    Ok(EvaluationSubmission {
        image_id,
        is_real,
        confidence,
    })
}

/// Integers, or strings holding one (HTML forms post numbers as text)
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
