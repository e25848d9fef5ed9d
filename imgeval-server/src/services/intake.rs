//! Evaluation intake
//!
//! Records one clinician's verdict on one image. Preconditions are checked
//! in a fixed order inside a single transaction:
//!
//! 1. the image exists (not found)
//! 2. an active assignment grants access to it (unauthorized)
//! 3. no evaluation exists yet for the pair (already evaluated)
//! 4. confidence is within 1..=5 (validation)
//!
//! After the insert, every open assignment of the clinician on the image's
//! set is re-checked and marked completed when its scope is fully evaluated.
//! This is the only write path that sets completion.

use imgeval_common::db::Evaluation;
use imgeval_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db;
use crate::services::progress;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

pub const MIN_CONFIDENCE: i64 = 1;
pub const MAX_CONFIDENCE: i64 = 5;

/// A verdict as submitted by a clinician
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationSubmission {
    pub image_id: i64,
    pub is_real: bool,
    pub confidence: i64,
}

/// A stored evaluation plus the assignments it completed
#[derive(Debug, Clone)]
pub struct RecordedEvaluation {
    pub evaluation: Evaluation,
    pub completed_assignments: Vec<i64>,
}

pub fn validate_confidence(confidence: i64) -> Result<()> {
    if (MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
        Ok(())
    } else {
        Err(Error::validation(
            "confidence",
            format!(
                "Confidence must be between {} and {}",
                MIN_CONFIDENCE, MAX_CONFIDENCE
            ),
        ))
    }
}

/// Validate and persist an evaluation
///
/// The transaction is re-run when SQLite reports lock contention, so a
/// concurrent duplicate ends in the step 3 check (or the UNIQUE constraint)
/// and is reported as already evaluated.
pub async fn record_evaluation(
    pool: &SqlitePool,
    clinician_id: i64,
    submission: EvaluationSubmission,
) -> Result<RecordedEvaluation> {
    retry_on_lock("record evaluation", DEFAULT_MAX_LOCK_WAIT_MS, || {
        record_once(pool, clinician_id, submission)
    })
    .await
}

async fn record_once(
    pool: &SqlitePool,
    clinician_id: i64,
    submission: EvaluationSubmission,
) -> Result<RecordedEvaluation> {
    let mut tx = pool.begin().await?;

    let image = db::images::get_image(&mut *tx, submission.image_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Image {}", submission.image_id)))?;

    if db::assignments::find_authorizing(&mut *tx, clinician_id, &image)
        .await?
        .is_none()
    {
        debug!(
            "Clinician {} has no active assignment covering image {}",
            clinician_id, image.id
        );
        return Err(Error::Unauthorized(
            "Image is not part of an active assignment".to_string(),
        ));
    }

    if db::evaluations::find_for_pair(&mut *tx, clinician_id, image.id)
        .await?
        .is_some()
    {
        return Err(Error::AlreadyEvaluated);
    }

    validate_confidence(submission.confidence)?;

    let evaluation = db::evaluations::insert_evaluation(
        &mut *tx,
        clinician_id,
        image.id,
        submission.is_real,
        submission.confidence,
    )
    .await?;

    let mut completed_assignments = Vec::new();
    let open =
        db::assignments::open_for_clinician_in_set(&mut *tx, clinician_id, image.image_set_id)
            .await?;
    for assignment in &open {
        if progress::recompute_completion(&mut *tx, assignment).await? {
            completed_assignments.push(assignment.id);
        }
    }

    tx.commit().await?;

    info!(
        "Recorded evaluation {} (clinician {}, image {}, confidence {})",
        evaluation.id, clinician_id, image.id, evaluation.confidence
    );

    Ok(RecordedEvaluation {
        evaluation,
        completed_assignments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds() {
        assert!(validate_confidence(1).is_ok());
        assert!(validate_confidence(5).is_ok());
        assert!(matches!(
            validate_confidence(0),
            Err(Error::Validation { ref field, .. }) if field == "confidence"
        ));
        assert!(validate_confidence(6).is_err());
        assert!(validate_confidence(-3).is_err());
    }
}
