//! Invitation tokens: public validation and admin issuance

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use imgeval_common::db::Invitation;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::AdminClinician;
use crate::services::registration::{self, TokenStatus};
use crate::{db, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub message: String,
}

/// POST /api/validate-token
///
/// **Request:** `{"token": "<uuid>"}`
/// **Response:** `{"valid": bool, "message": "..."}`; malformed JSON is 400.
/// The token is only checked, never consumed.
pub async fn validate_token(
    State(state): State<AppState>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ValidateTokenResponse>)> {
    let Ok(Json(request)) = payload else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ValidateTokenResponse {
                valid: false,
                message: "Invalid request".to_string(),
            }),
        ));
    };

    let raw = request.token.unwrap_or_default();
    let mut conn = state.db.acquire().await?;
    let status = registration::check_token(&mut conn, &raw).await?;
    debug!("Token check: {:?}", status);

    Ok((
        StatusCode::OK,
        Json(ValidateTokenResponse {
            valid: status == TokenStatus::Valid,
            message: status.message().to_string(),
        }),
    ))
}

/// POST /api/admin/invitations
pub async fn create_invitation(
    State(state): State<AppState>,
    AdminClinician(admin): AdminClinician,
) -> ApiResult<(StatusCode, Json<Invitation>)> {
    let mut conn = state.db.acquire().await?;
    let invitation = db::invitations::create_invitation(&mut conn).await?;
    info!("Invitation {} issued by '{}'", invitation.id, admin.username);
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /api/admin/invitations
pub async fn list_invitations(
    State(state): State<AppState>,
    AdminClinician(_): AdminClinician,
) -> ApiResult<Json<Vec<Invitation>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(db::invitations::list_invitations(&mut conn).await?))
}
