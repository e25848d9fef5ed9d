//! Invitation-gated registration

use imgeval_common::db::{Clinician, ClinicianProfile};
use imgeval_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::db::clinicians::NewClinician;
use crate::services::passwords;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Outcome of checking an invitation token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Missing,
    /// Malformed, unknown or already consumed; callers cannot tell which
    Invalid,
    Valid,
}

impl TokenStatus {
    pub fn message(&self) -> &'static str {
        match self {
            TokenStatus::Missing => "Token is required",
            TokenStatus::Invalid => "Invalid or already used token",
            TokenStatus::Valid => "Valid invitation token",
        }
    }
}

/// Parse a raw token string as a UUID
pub fn parse_token(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Check a token without consuming it
pub async fn check_token(conn: &mut SqliteConnection, raw: &str) -> Result<TokenStatus> {
    if raw.trim().is_empty() {
        return Ok(TokenStatus::Missing);
    }

    let Some(token) = parse_token(raw) else {
        return Ok(TokenStatus::Invalid);
    };

    Ok(match db::invitations::find_unused(conn, token).await? {
        Some(_) => TokenStatus::Valid,
        None => TokenStatus::Invalid,
    })
}

/// Everything a new clinician submits
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub token: String,
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
    pub profile: ClinicianProfile,
}

/// Field checks shared by registration and profile edits
pub fn validate_profile(profile: &ClinicianProfile) -> Result<()> {
    let required = [
        ("email", &profile.email),
        ("first_name", &profile.first_name),
        ("last_name", &profile.last_name),
        ("title", &profile.title),
        ("workplace", &profile.workplace),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::validation(field, "This field is required"));
        }
    }

    if !profile.email.contains('@') {
        return Err(Error::validation("email", "Enter a valid email address"));
    }
    if profile.years_experience < 0 {
        return Err(Error::validation(
            "years_experience",
            "Years of experience cannot be negative",
        ));
    }
    Ok(())
}

fn validate_registration(registration: &Registration) -> Result<()> {
    if registration.username.trim().is_empty() {
        return Err(Error::validation("username", "This field is required"));
    }
    validate_profile(&registration.profile)?;

    if registration.password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if registration.password != registration.password_confirmation {
        return Err(Error::validation(
            "password_confirmation",
            "The two password fields didn't match",
        ));
    }
    Ok(())
}

/// Consume an invitation and create the clinician account
pub async fn register(pool: &SqlitePool, registration: Registration) -> Result<Clinician> {
    if registration.token.trim().is_empty() {
        return Err(Error::validation("token", "Invitation token required"));
    }
    let token = parse_token(&registration.token)
        .ok_or_else(|| Error::validation("token", "Invalid token format"))?;

    validate_registration(&registration)?;

    retry_on_lock("register clinician", DEFAULT_MAX_LOCK_WAIT_MS, || {
        register_once(pool, &registration, token)
    })
    .await
}

async fn register_once(
    pool: &SqlitePool,
    registration: &Registration,
    token: Uuid,
) -> Result<Clinician> {
    let mut tx = pool.begin().await?;

    let invitation = db::invitations::find_unused(&mut *tx, token)
        .await?
        .ok_or_else(|| Error::validation("token", "Invalid or used invitation token"))?;

    let salt = passwords::generate_salt();
    let new = NewClinician {
        username: registration.username.trim().to_string(),
        profile: registration.profile.clone(),
        password_hash: passwords::hash_password(&registration.password, &salt),
        password_salt: salt,
        is_admin: false,
    };
    let clinician = db::clinicians::insert_clinician(&mut *tx, &new).await?;

    if !db::invitations::mark_used(&mut *tx, invitation.id).await? {
        return Err(Error::validation("token", "Invalid or used invitation token"));
    }

    tx.commit().await?;

    info!(
        "Registered clinician '{}' with invitation {}",
        clinician.username, invitation.id
    );
    Ok(clinician)
}

/// Create an administrator account (CLI bootstrap, no invitation)
pub async fn create_admin(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    email: &str,
) -> Result<Clinician> {
    if username.trim().is_empty() {
        return Err(Error::validation("username", "This field is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let salt = passwords::generate_salt();
    let new = NewClinician {
        username: username.trim().to_string(),
        profile: ClinicianProfile {
            email: email.to_string(),
            ..Default::default()
        },
        password_hash: passwords::hash_password(password, &salt),
        password_salt: salt,
        is_admin: true,
    };

    let mut conn = pool.acquire().await?;
    let admin = db::clinicians::insert_clinician(&mut conn, &new).await?;
    info!("Created administrator '{}'", admin.username);
    Ok(admin)
}
