//! Direct assignment creation and per-clinician assignment listing

use imgeval_common::db::Assignment;
use imgeval_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::info;

use crate::db;
use crate::services::notifier::{AssignmentNotice, AssignmentNotifier};
use crate::services::progress::{self, Progress};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Admin request to bind a clinician to an image set
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub clinician_id: i64,
    pub image_set_id: i64,
    /// Explicit subset; empty means the whole set
    pub image_ids: Vec<i64>,
}

/// Create one assignment; the (clinician, image set) pair must be new
pub async fn create_assignment(
    pool: &SqlitePool,
    request: NewAssignment,
    assigned_by: Option<i64>,
    notifier: &dyn AssignmentNotifier,
) -> Result<Assignment> {
    let image_ids: Vec<i64> = request
        .image_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (assignment, notice) = retry_on_lock("create assignment", DEFAULT_MAX_LOCK_WAIT_MS, || {
        create_once(pool, &request, &image_ids, assigned_by)
    })
    .await?;

    notifier.assignment_created(&notice);
    Ok(assignment)
}

async fn create_once(
    pool: &SqlitePool,
    request: &NewAssignment,
    image_ids: &[i64],
    assigned_by: Option<i64>,
) -> Result<(Assignment, AssignmentNotice)> {
    let mut tx = pool.begin().await?;

    let clinician = db::clinicians::get_clinician(&mut *tx, request.clinician_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Clinician {}", request.clinician_id)))?;
    let image_set = db::image_sets::get_image_set(&mut *tx, request.image_set_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Image set {}", request.image_set_id)))?;

    if db::images::count_in_set(&mut *tx, image_set.id, image_ids).await? != image_ids.len() {
        return Err(Error::validation(
            "image_ids",
            format!("All images must belong to image set '{}'", image_set.name),
        ));
    }

    let assignment =
        db::assignments::insert_assignment(&mut *tx, clinician.id, image_set.id, assigned_by)
            .await?;
    db::assignments::replace_subset(&mut *tx, assignment.id, image_ids).await?;
    let scope = progress::assignment_progress(&mut *tx, &assignment).await?;

    tx.commit().await?;

    info!(
        "Assigned image set '{}' to '{}' ({} images)",
        image_set.name, clinician.username, scope.total
    );

    let notice = AssignmentNotice {
        assignment_id: assignment.id,
        clinician_username: clinician.username,
        clinician_email: clinician.email,
        image_set_name: image_set.name,
        image_count: scope.total as usize,
    };
    Ok((assignment, notice))
}

/// An assignment as shown to its clinician
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOverview {
    pub id: i64,
    pub image_set_id: i64,
    pub image_set_name: String,
    pub image_set_active: bool,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub restricted_to_subset: bool,
    pub progress: Progress,
}

/// The clinician's assignments with live progress
pub async fn overview_for_clinician(
    pool: &SqlitePool,
    clinician_id: i64,
) -> Result<Vec<AssignmentOverview>> {
    let mut conn = pool.acquire().await?;
    let assignments = db::assignments::list_for_clinician(&mut conn, clinician_id).await?;

    let mut overview = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let image_set = db::image_sets::get_image_set(&mut conn, assignment.image_set_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Image set {}", assignment.image_set_id)))?;
        let subset = db::assignments::subset_image_ids(&mut conn, assignment.id).await?;
        let progress = progress::assignment_progress(&mut conn, &assignment).await?;

        overview.push(AssignmentOverview {
            id: assignment.id,
            image_set_id: image_set.id,
            image_set_name: image_set.name,
            image_set_active: image_set.is_active,
            is_completed: assignment.is_completed,
            completed_at: assignment.completed_at,
            restricted_to_subset: !subset.is_empty(),
            progress,
        });
    }

    Ok(overview)
}
