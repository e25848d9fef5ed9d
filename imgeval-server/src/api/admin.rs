//! Administrative endpoints
//!
//! Every handler takes [`AdminClinician`], so non-admins get 403 before any
//! work is done.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use imgeval_common::db::Assignment;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AdminClinician;
use crate::db::image_sets::ImageSetSummary;
use crate::services::assignments::{self, NewAssignment};
use crate::services::report::{self, AdminReport};
use crate::services::splitter::{self, SplitOutcome};
use crate::{db, ApiError, ApiResult, AppState};

/// GET /api/admin/image-sets
pub async fn list_image_sets(
    State(state): State<AppState>,
    AdminClinician(_): AdminClinician,
) -> ApiResult<Json<Vec<ImageSetSummary>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(db::image_sets::list_image_sets(&mut conn).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct SetActiveResponse {
    pub success: bool,
    pub image_set_id: i64,
    pub is_active: bool,
}

/// PUT /api/admin/image-sets/:id/active
///
/// Deactivating hides the set from selection and intake without touching
/// its assignments.
pub async fn set_image_set_active(
    State(state): State<AppState>,
    AdminClinician(admin): AdminClinician,
    Path(id): Path<i64>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> ApiResult<Json<SetActiveResponse>> {
    let Json(request) =
        payload.map_err(|_| ApiError::invalid_field("is_active", "Must be true or false"))?;

    let mut conn = state.db.acquire().await?;
    db::image_sets::set_active(&mut conn, id, request.is_active).await?;
    info!(
        "Image set {} marked {} by '{}'",
        id,
        if request.is_active { "active" } else { "inactive" },
        admin.username
    );

    Ok(Json(SetActiveResponse {
        success: true,
        image_set_id: id,
        is_active: request.is_active,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    #[serde(default)]
    pub clinician_ids: Vec<i64>,
}

/// POST /api/admin/image-sets/:id/split
///
/// **Request:** `{"clinician_ids": [3, 5, 8]}`
pub async fn split_image_set(
    State(state): State<AppState>,
    AdminClinician(admin): AdminClinician,
    Path(id): Path<i64>,
    payload: Result<Json<SplitRequest>, JsonRejection>,
) -> ApiResult<Json<SplitOutcome>> {
    let Json(request) = payload
        .map_err(|_| ApiError::invalid_field("clinician_ids", "Must be a list of clinician ids"))?;

    let outcome = splitter::split_image_set(
        &state.db,
        id,
        &request.clinician_ids,
        Some(admin.id),
        state.notifier.as_ref(),
    )
    .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub clinician_id: i64,
    pub image_set_id: i64,
    /// Omitted or empty assigns the whole set
    #[serde(default)]
    pub image_ids: Vec<i64>,
}

/// POST /api/admin/assignments
///
/// 409 when the clinician already holds an assignment on the set.
pub async fn create_assignment(
    State(state): State<AppState>,
    AdminClinician(admin): AdminClinician,
    payload: Result<Json<CreateAssignmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid request"))?;

    let assignment = assignments::create_assignment(
        &state.db,
        NewAssignment {
            clinician_id: request.clinician_id,
            image_set_id: request.image_set_id,
            image_ids: request.image_ids,
        },
        Some(admin.id),
        state.notifier.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// GET /api/admin/report
pub async fn report(
    State(state): State<AppState>,
    AdminClinician(_): AdminClinician,
) -> ApiResult<Json<AdminReport>> {
    Ok(Json(report::build_report(&state.db).await?))
}

/// GET /api/admin/evaluations/export
///
/// Served as a download named `evaluations_export_<YYYYmmdd_HHMMSS>.json`.
pub async fn export_evaluations(
    State(state): State<AppState>,
    AdminClinician(admin): AdminClinician,
) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let records = db::evaluations::export_evaluations(&mut conn).await?;
    info!(
        "Exported {} evaluations for '{}'",
        records.len(),
        admin.username
    );

    let filename = export_filename(Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Json(records),
    ))
}

fn export_filename(at: chrono::DateTime<Utc>) -> String {
    format!("evaluations_export_{}.json", at.format("%Y%m%d_%H%M%S"))
}
