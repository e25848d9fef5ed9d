//! Shared fixtures for imgeval-server integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use imgeval_common::db::init::init_database;
use imgeval_common::db::ClinicianProfile;
use imgeval_server::db;
use imgeval_server::db::clinicians::NewClinician;
use imgeval_server::db::images::NewImage;
use imgeval_server::services::notifier::{AssignmentNotice, AssignmentNotifier};
use imgeval_server::services::passwords;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Fresh schema in a temporary directory; keep the `TempDir` alive
pub async fn fresh_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("imgeval.db")).await.unwrap();
    (dir, pool)
}

pub async fn seed_clinician(pool: &SqlitePool, username: &str, is_admin: bool) -> i64 {
    let salt = passwords::generate_salt();
    let new = NewClinician {
        username: username.to_string(),
        profile: ClinicianProfile {
            email: format!("{}@hospital.test", username),
            first_name: "Test".to_string(),
            last_name: username.to_string(),
            title: "Radiologist".to_string(),
            workplace: "General Hospital".to_string(),
            years_experience: 5,
        },
        password_hash: passwords::hash_password("StrongPassword123!", &salt),
        password_salt: salt,
        is_admin,
    };

    let mut conn = pool.acquire().await.unwrap();
    db::clinicians::insert_clinician(&mut conn, &new)
        .await
        .unwrap()
        .id
}

/// Image set with `count` images; even positions are real, odd synthetic
pub async fn seed_image_set(pool: &SqlitePool, name: &str, count: usize) -> (i64, Vec<i64>) {
    let mut conn = pool.acquire().await.unwrap();
    let set = db::image_sets::create_image_set(&mut conn, name, None, None)
        .await
        .unwrap();

    let mut image_ids = Vec::with_capacity(count);
    for i in 0..count {
        let filename = format!("img_{:03}.png", i);
        let image = db::images::insert_image(
            &mut conn,
            &NewImage {
                image_set_id: set.id,
                file_path: format!("{}/{}", name, filename),
                original_filename: filename,
                is_real: i % 2 == 0,
            },
        )
        .await
        .unwrap();
        image_ids.push(image.id);
    }

    (set.id, image_ids)
}

/// Assign a set directly; an empty `subset` means the whole set
pub async fn assign(pool: &SqlitePool, clinician_id: i64, image_set_id: i64, subset: &[i64]) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    let assignment = db::assignments::insert_assignment(&mut conn, clinician_id, image_set_id, None)
        .await
        .unwrap();
    db::assignments::replace_subset(&mut conn, assignment.id, subset)
        .await
        .unwrap();
    assignment.id
}

pub async fn evaluation_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM evaluations")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Collects notices instead of delivering them
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<AssignmentNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

impl AssignmentNotifier for RecordingNotifier {
    fn assignment_created(&self, notice: &AssignmentNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
