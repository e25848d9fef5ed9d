//! Image persistence
//!
//! Images are created by the bulk-load tooling; the service only reads them.

use chrono::Utc;
use imgeval_common::db::Image;
use imgeval_common::{Error, Result};
use sqlx::SqliteConnection;

/// Fields needed to register an image file
#[derive(Debug, Clone)]
pub struct NewImage {
    pub image_set_id: i64,
    pub file_path: String,
    pub original_filename: String,
    pub is_real: bool,
}

/// Insert an image; filenames are unique within a set
pub async fn insert_image(conn: &mut SqliteConnection, new: &NewImage) -> Result<Image> {
    let result = sqlx::query(
        r#"
        INSERT INTO images (image_set_id, file_path, original_filename, is_real, uploaded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.image_set_id)
    .bind(&new.file_path)
    .bind(&new.original_filename)
    .bind(new.is_real)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(format!(
                "Image '{}' already exists in image set {}",
                new.original_filename, new.image_set_id
            )))
        }
        Err(e) => return Err(e),
    };

    get_image(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Image {} vanished after insert", id)))
}

pub async fn get_image(conn: &mut SqliteConnection, id: i64) -> Result<Option<Image>> {
    let row = sqlx::query("SELECT * FROM images WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Image::from_row(&r)).transpose()?)
}

/// Ids of every image in a set, in filename order
pub async fn list_image_ids(conn: &mut SqliteConnection, image_set_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT id FROM images WHERE image_set_id = ? ORDER BY original_filename",
    )
    .bind(image_set_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// How many of `image_ids` belong to the given set
pub async fn count_in_set(
    conn: &mut SqliteConnection,
    image_set_id: i64,
    image_ids: &[i64],
) -> Result<usize> {
    let mut found = 0;
    for &image_id in image_ids {
        let hit: Option<i64> =
            sqlx::query_scalar("SELECT id FROM images WHERE id = ? AND image_set_id = ?")
                .bind(image_id)
                .bind(image_set_id)
                .fetch_optional(&mut *conn)
                .await?;
        if hit.is_some() {
            found += 1;
        }
    }
    Ok(found)
}
