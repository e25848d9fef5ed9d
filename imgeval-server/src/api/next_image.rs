//! Next-image endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::CurrentClinician;
use crate::services::progress::Progress;
use crate::services::selector::{self, NextImage};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct NextImageQuery {
    pub assignment_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NextImageResponse {
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<usize>,
    pub progress: Progress,
}

/// GET /api/next-image[?assignment_id=N]
///
/// A random unevaluated image, or `completed: true` when none remain.
pub async fn next_image(
    State(state): State<AppState>,
    CurrentClinician(clinician): CurrentClinician,
    query: Result<Query<NextImageQuery>, QueryRejection>,
) -> ApiResult<Json<NextImageResponse>> {
    let Query(query) =
        query.map_err(|_| ApiError::invalid_field("assignment_id", "Must be an integer"))?;

    let response = match selector::next_image(&state.db, clinician.id, query.assignment_id).await? {
        NextImage::Image {
            image,
            remaining,
            progress,
        } => NextImageResponse {
            completed: false,
            image_url: Some(state.media_link(&image.file_path)),
            image_id: Some(image.id),
            remaining: Some(remaining),
            progress,
        },
        NextImage::Completed { progress } => NextImageResponse {
            completed: true,
            image_url: None,
            image_id: None,
            remaining: None,
            progress,
        },
    };

    Ok(Json(response))
}
