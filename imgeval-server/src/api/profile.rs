//! Clinician profile read and update

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use imgeval_common::db::ClinicianProfile;
use serde::Serialize;
use tracing::info;

use crate::api::CurrentClinician;
use crate::services::registration::validate_profile;
use crate::{db, ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    #[serde(flatten)]
    pub profile: ClinicianProfile,
}

/// GET /api/profile
pub async fn get_profile(CurrentClinician(clinician): CurrentClinician) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: clinician.id,
        username: clinician.username,
        is_admin: clinician.is_admin,
        profile: ClinicianProfile {
            email: clinician.email,
            first_name: clinician.first_name,
            last_name: clinician.last_name,
            title: clinician.title,
            workplace: clinician.workplace,
            years_experience: clinician.years_experience,
        },
    })
}

/// PUT /api/profile
///
/// Replaces all editable fields; the same checks as registration apply.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentClinician(clinician): CurrentClinician,
    payload: Result<Json<ClinicianProfile>, JsonRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Json(profile) = payload.map_err(|_| ApiError::bad_request("Invalid request"))?;
    validate_profile(&profile)?;

    let mut conn = state.db.acquire().await?;
    db::clinicians::update_profile(&mut conn, clinician.id, &profile).await?;
    info!("Profile updated for '{}'", clinician.username);

    Ok(Json(ProfileResponse {
        id: clinician.id,
        username: clinician.username,
        is_admin: clinician.is_admin,
        profile,
    }))
}
