//! Administrative reporting: progress and accuracy across clinicians

use imgeval_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db;
use crate::services::progress::{self, AccuracyStats, Progress};

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentReport {
    pub assignment_id: i64,
    pub clinician_id: i64,
    pub clinician_username: String,
    pub image_set_id: i64,
    pub image_set_name: String,
    pub is_completed: bool,
    pub progress: Progress,
    pub accuracy: AccuracyStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicianReport {
    pub clinician_id: i64,
    pub username: String,
    pub title: String,
    pub workplace: String,
    pub years_experience: i64,
    pub assignment_count: usize,
    pub completed_assignments: usize,
    /// Over every evaluation the clinician has recorded
    pub accuracy: AccuracyStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminReport {
    pub assignments: Vec<AssignmentReport>,
    pub clinicians: Vec<ClinicianReport>,
}

pub async fn build_report(pool: &SqlitePool) -> Result<AdminReport> {
    let mut conn = pool.acquire().await?;

    let clinicians = db::clinicians::list_clinicians(&mut conn).await?;
    let usernames: HashMap<i64, String> = clinicians
        .iter()
        .map(|c| (c.id, c.username.clone()))
        .collect();

    let image_sets = db::image_sets::list_image_sets(&mut conn).await?;
    let set_names: HashMap<i64, String> = image_sets
        .iter()
        .map(|s| (s.image_set.id, s.image_set.name.clone()))
        .collect();

    let mut assignments = Vec::new();
    for assignment in db::assignments::list_assignments(&mut conn).await? {
        let progress = progress::assignment_progress(&mut conn, &assignment).await?;
        let accuracy = progress::assignment_accuracy(&mut conn, &assignment).await?;

        assignments.push(AssignmentReport {
            assignment_id: assignment.id,
            clinician_id: assignment.clinician_id,
            clinician_username: usernames
                .get(&assignment.clinician_id)
                .cloned()
                .unwrap_or_default(),
            image_set_id: assignment.image_set_id,
            image_set_name: set_names
                .get(&assignment.image_set_id)
                .cloned()
                .unwrap_or_default(),
            is_completed: assignment.is_completed,
            progress,
            accuracy,
        });
    }

    let mut clinician_reports = Vec::with_capacity(clinicians.len());
    for clinician in clinicians {
        let own: Vec<&AssignmentReport> = assignments
            .iter()
            .filter(|a| a.clinician_id == clinician.id)
            .collect();
        let accuracy = progress::clinician_accuracy(&mut conn, clinician.id).await?;

        clinician_reports.push(ClinicianReport {
            clinician_id: clinician.id,
            username: clinician.username,
            title: clinician.title,
            workplace: clinician.workplace,
            years_experience: clinician.years_experience,
            assignment_count: own.len(),
            completed_assignments: own.iter().filter(|a| a.is_completed).count(),
            accuracy,
        });
    }

    Ok(AdminReport {
        assignments,
        clinicians: clinician_reports,
    })
}
