//! Caller identity extractors
//!
//! Sign-in happens upstream; the authenticating proxy forwards the
//! clinician's id in [`CLINICIAN_HEADER`]. Requests without a resolvable
//! clinician are rejected with 401.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use imgeval_common::db::Clinician;
use tracing::debug;

use crate::{db, ApiError, AppState};

/// Header carrying the authenticated clinician id
pub const CLINICIAN_HEADER: &str = "x-clinician-id";

/// The clinician making the request
#[derive(Debug, Clone)]
pub struct CurrentClinician(pub Clinician);

#[async_trait]
impl FromRequestParts<AppState> for CurrentClinician {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(CLINICIAN_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let mut conn = state.db.acquire().await?;
        match db::clinicians::get_clinician(&mut conn, id).await? {
            Some(clinician) => Ok(CurrentClinician(clinician)),
            None => {
                debug!("Unknown clinician id {} in identity header", id);
                Err(ApiError::Unauthenticated)
            }
        }
    }
}

/// A clinician with the admin flag
#[derive(Debug, Clone)]
pub struct AdminClinician(pub Clinician);

#[async_trait]
impl FromRequestParts<AppState> for AdminClinician {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentClinician(clinician) = CurrentClinician::from_request_parts(parts, state).await?;
        if !clinician.is_admin {
            return Err(ApiError::Forbidden(format!(
                "'{}' is not an administrator",
                clinician.username
            )));
        }
        Ok(AdminClinician(clinician))
    }
}
