//! Even split of an image set across clinicians
//!
//! Images are shuffled, then cut into contiguous chunks whose sizes differ by
//! at most one: with `q, m = divmod(n, k)` the first `m` clinicians get
//! `q + 1` images and the rest get `q`. Each chunk becomes the explicit
//! subset of that clinician's assignment. Re-splitting overwrites the subset
//! and clears the completion flag; earlier evaluations are kept.

use imgeval_common::db::Clinician;
use imgeval_common::{Error, Result};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::db;
use crate::services::notifier::{AssignmentNotice, AssignmentNotifier};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// One clinician's share of a split
#[derive(Debug, Clone, Serialize)]
pub struct SplitShare {
    pub assignment_id: i64,
    pub clinician_id: i64,
    pub image_ids: Vec<i64>,
    /// False when an existing assignment was overwritten
    pub created: bool,
}

/// Result of a split request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SplitOutcome {
    Assigned {
        shares: Vec<SplitShare>,
        /// Clinicians left without images because there were fewer images
        /// than clinicians; any assignment they had on the set is removed
        unassigned_clinicians: Vec<i64>,
    },
    /// The image set has no images; nothing was written
    EmptyImageSet,
}

/// Chunk sizes for `n` items over `k` recipients
pub fn chunk_sizes(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let (q, m) = (n / k, n % k);
    (0..k).map(|i| if i < m { q + 1 } else { q }).collect()
}

/// Cut `items` into `k` contiguous chunks sized by [`chunk_sizes`]
pub fn partition<T>(items: Vec<T>, k: usize) -> Vec<Vec<T>> {
    let sizes = chunk_sizes(items.len(), k);
    let mut iter = items.into_iter();
    sizes
        .into_iter()
        .map(|size| iter.by_ref().take(size).collect())
        .collect()
}

/// Uniform shuffle, unseeded
fn shuffled(mut ids: Vec<i64>) -> Vec<i64> {
    ids.shuffle(&mut rand::thread_rng());
    ids
}

/// Split an image set across `clinician_ids` in one transaction
///
/// Clinicians left without images lose any assignment they held on the set,
/// so after a split every image is covered exactly once.
pub async fn split_image_set(
    pool: &SqlitePool,
    image_set_id: i64,
    clinician_ids: &[i64],
    assigned_by: Option<i64>,
    notifier: &dyn AssignmentNotifier,
) -> Result<SplitOutcome> {
    if clinician_ids.is_empty() {
        return Err(Error::validation(
            "clinician_ids",
            "At least one clinician is required",
        ));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = clinician_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::validation(
            "clinician_ids",
            format!("Clinician {} is listed more than once", dup),
        ));
    }

    let (outcome, notices) = retry_on_lock("split image set", DEFAULT_MAX_LOCK_WAIT_MS, || {
        split_once(pool, image_set_id, clinician_ids, assigned_by)
    })
    .await?;

    for notice in &notices {
        notifier.assignment_created(notice);
    }

    Ok(outcome)
}

async fn split_once(
    pool: &SqlitePool,
    image_set_id: i64,
    clinician_ids: &[i64],
    assigned_by: Option<i64>,
) -> Result<(SplitOutcome, Vec<AssignmentNotice>)> {
    let mut tx = pool.begin().await?;

    let image_set = db::image_sets::get_image_set(&mut *tx, image_set_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Image set {}", image_set_id)))?;

    let mut clinicians: Vec<Clinician> = Vec::with_capacity(clinician_ids.len());
    for &clinician_id in clinician_ids {
        let clinician = db::clinicians::get_clinician(&mut *tx, clinician_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Clinician {}", clinician_id)))?;
        clinicians.push(clinician);
    }

    let image_ids = db::images::list_image_ids(&mut *tx, image_set_id).await?;
    if image_ids.is_empty() {
        info!("Image set '{}' has no images; split skipped", image_set.name);
        return Ok((SplitOutcome::EmptyImageSet, Vec::new()));
    }

    let chunks = partition(shuffled(image_ids), clinicians.len());

    let mut shares = Vec::new();
    let mut unassigned_clinicians = Vec::new();
    let mut notices = Vec::new();

    for (clinician, chunk) in clinicians.iter().zip(chunks) {
        let existing = db::assignments::find_for_pair(&mut *tx, clinician.id, image_set_id).await?;

        // An empty subset would mean "whole set"
        if chunk.is_empty() {
            if let Some(stale) = existing {
                db::assignments::delete_assignment(&mut *tx, stale.id).await?;
                info!(
                    "Removed assignment {} of '{}' on '{}': no images left in split",
                    stale.id, clinician.username, image_set.name
                );
            }
            unassigned_clinicians.push(clinician.id);
            continue;
        }

        let (assignment_id, created) = match existing {
            Some(assignment) => {
                db::assignments::reset_completion(&mut *tx, assignment.id, assigned_by).await?;
                (assignment.id, false)
            }
            None => {
                let assignment = db::assignments::insert_assignment(
                    &mut *tx,
                    clinician.id,
                    image_set_id,
                    assigned_by,
                )
                .await?;
                (assignment.id, true)
            }
        };
        db::assignments::replace_subset(&mut *tx, assignment_id, &chunk).await?;

        if created {
            notices.push(AssignmentNotice {
                assignment_id,
                clinician_username: clinician.username.clone(),
                clinician_email: clinician.email.clone(),
                image_set_name: image_set.name.clone(),
                image_count: chunk.len(),
            });
        }

        shares.push(SplitShare {
            assignment_id,
            clinician_id: clinician.id,
            image_ids: chunk,
            created,
        });
    }

    tx.commit().await?;

    if !unassigned_clinicians.is_empty() {
        warn!(
            "Image set '{}' has fewer images than clinicians; {} clinician(s) received none",
            image_set.name,
            unassigned_clinicians.len()
        );
    }
    info!(
        "Split image set '{}' across {} clinician(s)",
        image_set.name,
        shares.len()
    );

    Ok((
        SplitOutcome::Assigned {
            shares,
            unassigned_clinicians,
        },
        notices,
    ))
}
