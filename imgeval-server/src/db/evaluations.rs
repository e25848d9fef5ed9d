//! Evaluation persistence

use chrono::{DateTime, Utc};
use imgeval_common::db::Evaluation;
use imgeval_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::services::progress::EvaluationOutcome;

/// Insert an evaluation
///
/// The UNIQUE (clinician_id, image_id) constraint is the authoritative guard
/// against duplicates; a violation maps to [`Error::AlreadyEvaluated`].
pub async fn insert_evaluation(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image_id: i64,
    is_real: bool,
    confidence: i64,
) -> Result<Evaluation> {
    let result = sqlx::query(
        r#"
        INSERT INTO evaluations (clinician_id, image_id, is_real, confidence, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(clinician_id)
    .bind(image_id)
    .bind(is_real)
    .bind(confidence)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => return Err(Error::AlreadyEvaluated),
        Err(e) => return Err(e),
    };

    get_evaluation(conn, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Evaluation {} vanished after insert", id)))
}

pub async fn get_evaluation(conn: &mut SqliteConnection, id: i64) -> Result<Option<Evaluation>> {
    let row = sqlx::query("SELECT * FROM evaluations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Evaluation::from_row(&r)).transpose()?)
}

/// The clinician's evaluation of an image, if recorded
pub async fn find_for_pair(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    image_id: i64,
) -> Result<Option<Evaluation>> {
    let row = sqlx::query("SELECT * FROM evaluations WHERE clinician_id = ? AND image_id = ?")
        .bind(clinician_id)
        .bind(image_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| Evaluation::from_row(&r)).transpose()?)
}

/// Every evaluation of a clinician joined with ground truth
pub async fn outcomes_for_clinician(
    conn: &mut SqliteConnection,
    clinician_id: i64,
) -> Result<Vec<EvaluationOutcome>> {
    let rows = sqlx::query(
        r#"
        SELECT e.is_real AS guessed_real, i.is_real AS actual_real, e.confidence
        FROM evaluations e
        JOIN images i ON i.id = e.image_id
        WHERE e.clinician_id = ?
        "#,
    )
    .bind(clinician_id)
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

/// Clinician details embedded in an export record
#[derive(Debug, Clone, Serialize)]
pub struct ExportedClinician {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub workplace: String,
    pub years_experience: i64,
}

/// One evaluation as written to the admin JSON export
#[derive(Debug, Clone, Serialize)]
pub struct ExportedEvaluation {
    pub id: i64,
    pub clinician: ExportedClinician,
    pub image_set: String,
    pub image_id: i64,
    pub image_path: String,
    pub original_filename: String,
    pub image_is_real: bool,
    pub is_real: bool,
    pub confidence: i64,
    pub timestamp: DateTime<Utc>,
}

/// All evaluations in submission order, denormalized for export
pub async fn export_evaluations(conn: &mut SqliteConnection) -> Result<Vec<ExportedEvaluation>> {
    let rows = sqlx::query(
        r#"
        SELECT e.id, e.is_real, e.confidence, e.created_at,
               c.username, c.email, c.first_name, c.last_name, c.title, c.workplace,
               c.years_experience,
               s.name AS image_set,
               i.id AS image_id, i.file_path, i.original_filename, i.is_real AS image_is_real
        FROM evaluations e
        JOIN clinicians c ON c.id = e.clinician_id
        JOIN images i ON i.id = e.image_id
        JOIN image_sets s ON s.id = i.image_set_id
        ORDER BY e.created_at, e.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<ExportedEvaluation> {
            Ok(ExportedEvaluation {
                id: row.try_get("id")?,
                clinician: ExportedClinician {
                    username: row.try_get("username")?,
                    email: row.try_get("email")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    title: row.try_get("title")?,
                    workplace: row.try_get("workplace")?,
                    years_experience: row.try_get("years_experience")?,
                },
                image_set: row.try_get("image_set")?,
                image_id: row.try_get("image_id")?,
                image_path: row.try_get("file_path")?,
                original_filename: row.try_get("original_filename")?,
                image_is_real: row.try_get("image_is_real")?,
                is_real: row.try_get("is_real")?,
                confidence: row.try_get("confidence")?,
                timestamp: row.try_get("created_at")?,
            })
        })
        .collect()
}
