//! Clinician persistence

use chrono::Utc;
use imgeval_common::db::{Clinician, ClinicianProfile};
use imgeval_common::{Error, Result};
use sqlx::SqliteConnection;

/// Fields needed to create a clinician row
#[derive(Debug, Clone)]
pub struct NewClinician {
    pub username: String,
    pub profile: ClinicianProfile,
    pub password_hash: String,
    pub password_salt: String,
    pub is_admin: bool,
}

/// Insert a clinician; a taken username is a conflict
pub async fn insert_clinician(conn: &mut SqliteConnection, new: &NewClinician) -> Result<Clinician> {
    let result = sqlx::query(
        r#"
        INSERT INTO clinicians (
            username, email, first_name, last_name, title, workplace,
            years_experience, password_hash, password_salt, is_admin, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.username)
    .bind(&new.profile.email)
    .bind(&new.profile.first_name)
    .bind(&new.profile.last_name)
    .bind(&new.profile.title)
    .bind(&new.profile.workplace)
    .bind(new.profile.years_experience)
    .bind(&new.password_hash)
    .bind(&new.password_salt)
    .bind(new.is_admin)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(format!(
                "Username '{}' is already taken",
                new.username
            )))
        }
        Err(e) => return Err(e),
    };

    get_clinician(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Clinician {} vanished after insert", id)))
}

pub async fn get_clinician(conn: &mut SqliteConnection, id: i64) -> Result<Option<Clinician>> {
    let row = sqlx::query("SELECT * FROM clinicians WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Clinician::from_row(&r)).transpose()?)
}

pub async fn get_clinician_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Clinician>> {
    let row = sqlx::query("SELECT * FROM clinicians WHERE username = ?")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Clinician::from_row(&r)).transpose()?)
}

pub async fn list_clinicians(conn: &mut SqliteConnection) -> Result<Vec<Clinician>> {
    let rows = sqlx::query("SELECT * FROM clinicians ORDER BY username")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|r| Clinician::from_row(r).map_err(Error::from))
        .collect()
}

/// Overwrite the editable profile fields
pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: i64,
    profile: &ClinicianProfile,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE clinicians
        SET email = ?, first_name = ?, last_name = ?, title = ?, workplace = ?, years_experience = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.email)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.title)
    .bind(&profile.workplace)
    .bind(profile.years_experience)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Clinician {}", id)));
    }
    Ok(())
}
