//! Invitation token persistence
//!
//! Tokens are stored as hyphenated UUID text.

use chrono::Utc;
use imgeval_common::db::Invitation;
use imgeval_common::{Error, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Create a fresh unused invitation
pub async fn create_invitation(conn: &mut SqliteConnection) -> Result<Invitation> {
    let token = Uuid::new_v4();

    let id = sqlx::query("INSERT INTO invitations (token, is_used, created_at) VALUES (?, 0, ?)")
        .bind(token.to_string())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let row = sqlx::query("SELECT * FROM invitations WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(Invitation::from_row(&row)?)
}

/// Look up an invitation that has not been consumed yet
pub async fn find_unused(conn: &mut SqliteConnection, token: Uuid) -> Result<Option<Invitation>> {
    let row = sqlx::query("SELECT * FROM invitations WHERE token = ? AND is_used = 0")
        .bind(token.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Invitation::from_row(&r)).transpose()?)
}

/// Consume an invitation
///
/// Returns false if it was already used; the `is_used = 0` guard makes two
/// registrations racing on one token resolve to a single winner.
pub async fn mark_used(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE invitations SET is_used = 1, used_at = ? WHERE id = ? AND is_used = 0",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_invitations(conn: &mut SqliteConnection) -> Result<Vec<Invitation>> {
    let rows = sqlx::query("SELECT * FROM invitations ORDER BY created_at DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|r| Invitation::from_row(r).map_err(Error::from))
        .collect()
}
