//! Assignment persistence and effective-scope queries
//!
//! The effective scope of an assignment is its explicit image subset
//! (`assignment_images`) when that is non-empty, else every image of the
//! assignment's image set. [`SCOPE_FILTER`] expresses this over an `images i`
//! alias and binds, in order: image_set_id, assignment_id, assignment_id.

use chrono::{DateTime, Utc};
use imgeval_common::db::{Assignment, Image};
use imgeval_common::{Error, Result};
use sqlx::{Row, SqliteConnection};

use crate::services::progress::EvaluationOutcome;

const SCOPE_FILTER: &str = r#"
    i.image_set_id = ?
    AND (
        NOT EXISTS (SELECT 1 FROM assignment_images ai WHERE ai.assignment_id = ?)
        OR EXISTS (
            SELECT 1 FROM assignment_images ai
            WHERE ai.assignment_id = ? AND ai.image_id = i.id
        )
    )
"#;

pub async fn get_assignment(conn: &mut SqliteConnection, id: i64) -> Result<Option<Assignment>> {
    let row = sqlx::query("SELECT * FROM assignments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Assignment::from_row(&r)).transpose()?)
}

/// The assignment binding a clinician to an image set, if any
pub async fn find_for_pair(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image_set_id: i64,
) -> Result<Option<Assignment>> {
    let row = sqlx::query("SELECT * FROM assignments WHERE clinician_id = ? AND image_set_id = ?")
        .bind(clinician_id)
        .bind(image_set_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Assignment::from_row(&r)).transpose()?)
}

/// Create an assignment; one per (clinician, image set)
pub async fn insert_assignment(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image_set_id: i64,
    assigned_by: Option<i64>,
) -> Result<Assignment> {
    let result = sqlx::query(
        r#"
        INSERT INTO assignments (clinician_id, image_set_id, assigned_at, assigned_by, is_completed)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(clinician_id)
    .bind(image_set_id)
    .bind(Utc::now())
    .bind(assigned_by)
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(format!(
                "Clinician {} is already assigned to image set {}",
                clinician_id, image_set_id
            )))
        }
        Err(e) => return Err(e),
    };

    get_assignment(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Assignment {} vanished after insert", id)))
}

/// Remove an assignment and its subset rows; evaluations are not touched
pub async fn delete_assignment(conn: &mut SqliteConnection, assignment_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Replace the explicit image subset (empty slice means whole set)
pub async fn replace_subset(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    image_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM assignment_images WHERE assignment_id = ?")
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;

    for &image_id in image_ids {
        sqlx::query("INSERT INTO assignment_images (assignment_id, image_id) VALUES (?, ?)")
            .bind(assignment_id)
            .bind(image_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Image ids of the explicit subset, empty when the whole set is implied
pub async fn subset_image_ids(conn: &mut SqliteConnection, assignment_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT image_id FROM assignment_images WHERE assignment_id = ? ORDER BY image_id",
    )
    .bind(assignment_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// Clear the completion flag
pub async fn reset_completion(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    assigned_by: Option<i64>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE assignments
        SET is_completed = 0, completed_at = NULL, assigned_at = ?, assigned_by = ?
        WHERE id = ?
        "#,
    )
    .bind(Utc::now())
    .bind(assigned_by)
    .bind(assignment_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn mark_completed(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    completed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE assignments SET is_completed = 1, completed_at = ? WHERE id = ?")
        .bind(completed_at)
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Every assignment, newest first
pub async fn list_assignments(conn: &mut SqliteConnection) -> Result<Vec<Assignment>> {
    let rows = sqlx::query("SELECT * FROM assignments ORDER BY assigned_at DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|r| Assignment::from_row(r).map_err(Error::from))
        .collect()
}

/// A clinician's assignments, newest first
pub async fn list_for_clinician(
    conn: &mut SqliteConnection,
    clinician_id: i64,
) -> Result<Vec<Assignment>> {
    let rows = sqlx::query(
        "SELECT * FROM assignments WHERE clinician_id = ? ORDER BY assigned_at DESC, id DESC",
    )
    .bind(clinician_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| Assignment::from_row(r).map_err(Error::from))
        .collect()
}

/// A clinician's assignments on active image sets
///
/// With `open_only`, completed assignments are left out.
pub async fn list_on_active_sets(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    open_only: bool,
) -> Result<Vec<Assignment>> {
    let rows = sqlx::query(
        r#"
        SELECT a.*
        FROM assignments a
        JOIN image_sets s ON s.id = a.image_set_id
        WHERE a.clinician_id = ?
          AND s.is_active = 1
          AND (? = 0 OR a.is_completed = 0)
        ORDER BY a.assigned_at, a.id
        "#,
    )
    .bind(clinician_id)
    .bind(open_only)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| Assignment::from_row(r).map_err(Error::from))
        .collect()
}

/// Not-yet-completed assignments of a clinician on one image set
pub async fn open_for_clinician_in_set(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image_set_id: i64,
) -> Result<Vec<Assignment>> {
    let rows = sqlx::query(
        "SELECT * FROM assignments WHERE clinician_id = ? AND image_set_id = ? AND is_completed = 0",
    )
    .bind(clinician_id)
    .bind(image_set_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| Assignment::from_row(r).map_err(Error::from))
        .collect()
}

/// Id of an active assignment that grants the clinician access to the image
///
/// Active means not completed and on an active image set; the subset
/// restriction is honored.
pub async fn find_authorizing(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image: &Image,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(
        r#"
        SELECT a.id
        FROM assignments a
        JOIN image_sets s ON s.id = a.image_set_id
        WHERE a.clinician_id = ?
          AND a.image_set_id = ?
          AND a.is_completed = 0
          AND s.is_active = 1
          AND (
              NOT EXISTS (SELECT 1 FROM assignment_images ai WHERE ai.assignment_id = a.id)
              OR EXISTS (
                  SELECT 1 FROM assignment_images ai
                  WHERE ai.assignment_id = a.id AND ai.image_id = ?
              )
          )
        LIMIT 1
        "#,
    )
    .bind(clinician_id)
    .bind(image.image_set_id)
    .bind(image.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// (evaluated, total) over the assignment's effective scope
pub async fn scope_counts(conn: &mut SqliteConnection, assignment: &Assignment) -> Result<(i64, i64)> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM images i WHERE {}",
        SCOPE_FILTER
    ))
    .bind(assignment.image_set_id)
    .bind(assignment.id)
    .bind(assignment.id)
    .fetch_one(&mut *conn)
    .await?;

    let evaluated: i64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COUNT(*)
        FROM images i
        JOIN evaluations e ON e.image_id = i.id AND e.clinician_id = ?
        WHERE {}
        "#,
        SCOPE_FILTER
    ))
    .bind(assignment.clinician_id)
    .bind(assignment.image_set_id)
    .bind(assignment.id)
    .bind(assignment.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((evaluated, total))
}

/// The assignment clinician's evaluations within the effective scope
pub async fn scope_outcomes(
    conn: &mut SqliteConnection,
    assignment: &Assignment,
) -> Result<Vec<EvaluationOutcome>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT e.is_real AS guessed_real, i.is_real AS actual_real, e.confidence
        FROM images i
        JOIN evaluations e ON e.image_id = i.id AND e.clinician_id = ?
        WHERE {}
        "#,
        SCOPE_FILTER
    ))
    .bind(assignment.clinician_id)
    .bind(assignment.image_set_id)
    .bind(assignment.id)
    .bind(assignment.id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<EvaluationOutcome> {
            Ok(EvaluationOutcome {
                guessed_real: row.try_get("guessed_real")?,
                actual_real: row.try_get("actual_real")?,
                confidence: row.try_get("confidence")?,
            })
        })
        .collect()
}

/// Images in the effective scope the clinician has not evaluated yet
pub async fn remaining_in_scope(
    conn: &mut SqliteConnection,
    assignment: &Assignment,
) -> Result<Vec<Image>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT i.*
        FROM images i
        WHERE {}
          AND NOT EXISTS (
              SELECT 1 FROM evaluations e
              WHERE e.image_id = i.id AND e.clinician_id = ?
          )
        ORDER BY i.id
        "#,
        SCOPE_FILTER
    ))
    .bind(assignment.image_set_id)
    .bind(assignment.id)
    .bind(assignment.id)
    .bind(assignment.clinician_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| Image::from_row(r).map_err(Error::from))
        .collect()
}
