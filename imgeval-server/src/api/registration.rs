//! Clinician registration with an invitation token

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use imgeval_common::db::ClinicianProfile;
use serde::{Deserialize, Serialize};

use crate::services::registration::{self, Registration};
use crate::{ApiError, ApiResult, AppState};

/// Registration form; every field is required
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub token: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub workplace: String,
    pub years_experience: Option<i64>,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub clinician_id: i64,
    pub username: String,
}

/// POST /api/register
///
/// Consumes the invitation and creates the account in one transaction.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid request"))?;

    let years_experience = request
        .years_experience
        .ok_or_else(|| ApiError::invalid_field("years_experience", "This field is required"))?;

    let clinician = registration::register(
        &state.db,
        Registration {
            token: request.token,
            username: request.username,
            password: request.password,
            password_confirmation: request.password_confirmation,
            profile: ClinicianProfile {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                title: request.title,
                workplace: request.workplace,
                years_experience,
            },
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful".to_string(),
            clinician_id: clinician.id,
            username: clinician.username,
        }),
    ))
}
