//! Image set persistence

use chrono::Utc;
use imgeval_common::db::ImageSet;
use imgeval_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

/// Image set with its label breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ImageSetSummary {
    #[serde(flatten)]
    pub image_set: ImageSet,
    pub image_count: i64,
    pub real_count: i64,
    pub synth_count: i64,
}

/// Create an image set; names are unique
pub async fn create_image_set(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
    created_by: Option<i64>,
) -> Result<ImageSet> {
    let result = sqlx::query(
        "INSERT INTO image_sets (name, description, created_at, created_by, is_active) VALUES (?, ?, ?, ?, 1)",
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .bind(created_by)
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(format!("Image set '{}' already exists", name)))
        }
        Err(e) => return Err(e),
    };

    get_image_set(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Image set {} vanished after insert", id)))
}

pub async fn get_image_set(conn: &mut SqliteConnection, id: i64) -> Result<Option<ImageSet>> {
    let row = sqlx::query("SELECT * FROM image_sets WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| ImageSet::from_row(&r)).transpose()?)
}

/// All image sets, newest first, with real/synthetic counts
pub async fn list_image_sets(conn: &mut SqliteConnection) -> Result<Vec<ImageSetSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT s.*,
               COUNT(i.id) AS image_count,
               COALESCE(SUM(CASE WHEN i.is_real = 1 THEN 1 ELSE 0 END), 0) AS real_count,
               COALESCE(SUM(CASE WHEN i.is_real = 0 THEN 1 ELSE 0 END), 0) AS synth_count
        FROM image_sets s
        LEFT JOIN images i ON i.image_set_id = s.id
        GROUP BY s.id
        ORDER BY s.created_at DESC, s.id DESC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<ImageSetSummary> {
            Ok(ImageSetSummary {
                image_set: ImageSet::from_row(row)?,
                image_count: row.try_get("image_count")?,
                real_count: row.try_get("real_count")?,
                synth_count: row.try_get("synth_count")?,
            })
        })
        .collect()
}

/// Toggle whether the set is available for evaluation
pub async fn set_active(conn: &mut SqliteConnection, id: i64, is_active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE image_sets SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Image set {}", id)));
    }
    Ok(())
}
