//! Next-image selection
//!
//! Stateless: each call recomputes the clinician's remaining images and picks
//! one uniformly at random. Only recording an evaluation shrinks the pool.

use imgeval_common::db::{Assignment, Image};
use imgeval_common::{Error, Result};
use rand::seq::SliceRandom;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db;
use crate::services::progress::{self, Progress};

/// Selector result
#[derive(Debug, Clone)]
pub enum NextImage {
    Image {
        image: Image,
        /// Unevaluated images left, including this one
        remaining: usize,
        progress: Progress,
    },
    Completed {
        progress: Progress,
    },
}

/// Pick the next image for a clinician
///
/// With `assignment_id`, only that assignment is considered; otherwise all
/// of the clinician's active assignments are pooled.
pub async fn next_image(
    pool: &SqlitePool,
    clinician_id: i64,
    assignment_id: Option<i64>,
) -> Result<NextImage> {
    let mut conn = pool.acquire().await?;

    let (progress_scope, candidates) = match assignment_id {
        Some(id) => {
            let assignment = named_assignment(&mut conn, clinician_id, id).await?;
            let candidates = if assignment.is_completed {
                Vec::new()
            } else {
                vec![assignment.clone()]
            };
            (vec![assignment], candidates)
        }
        None => {
            let all = db::assignments::list_on_active_sets(&mut conn, clinician_id, false).await?;
            let open = all.iter().filter(|a| !a.is_completed).cloned().collect();
            (all, open)
        }
    };

    let mut parts = Vec::with_capacity(progress_scope.len());
    for assignment in &progress_scope {
        parts.push(progress::assignment_progress(&mut conn, assignment).await?);
    }
    let progress = Progress::combine(parts);

    let mut remaining = Vec::new();
    for assignment in &candidates {
        remaining.extend(db::assignments::remaining_in_scope(&mut conn, assignment).await?);
    }

    Ok(match pick_random(remaining) {
        Some((image, remaining)) => NextImage::Image {
            image,
            remaining,
            progress,
        },
        None => NextImage::Completed { progress },
    })
}

/// Load an assignment the clinician owns on an active image set
async fn named_assignment(
    conn: &mut SqliteConnection,
    clinician_id: i64,
    assignment_id: i64,
) -> Result<Assignment> {
    let assignment = db::assignments::get_assignment(conn, assignment_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Assignment {}", assignment_id)))?;

    if assignment.clinician_id != clinician_id {
        return Err(Error::Unauthorized(
            "Assignment belongs to another clinician".to_string(),
        ));
    }

    let image_set = db::image_sets::get_image_set(conn, assignment.image_set_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Image set {}", assignment.image_set_id)))?;
    if !image_set.is_active {
        return Err(Error::Unauthorized("Image set is not active".to_string()));
    }

    Ok(assignment)
}

fn pick_random(images: Vec<Image>) -> Option<(Image, usize)> {
    let count = images.len();
    images
        .choose(&mut rand::thread_rng())
        .cloned()
        .map(|image| (image, count))
}
