//! Clinician-facing assignment listing

use axum::{extract::State, Json};

use crate::api::CurrentClinician;
use crate::services::assignments::{self, AssignmentOverview};
use crate::{ApiResult, AppState};

/// GET /api/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    CurrentClinician(clinician): CurrentClinician,
) -> ApiResult<Json<Vec<AssignmentOverview>>> {
    Ok(Json(
        assignments::overview_for_clinician(&state.db, clinician.id).await?,
    ))
}
