//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// A registered clinician (or administrator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinician {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub workplace: String,
    pub years_experience: i64,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub password_salt: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl Clinician {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            title: row.try_get("title")?,
            workplace: row.try_get("workplace")?,
            years_experience: row.try_get("years_experience")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Profile fields shared by registration and profile updates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicianProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub workplace: String,
    pub years_experience: i64,
}

/// Named collection of labeled images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub is_active: bool,
}

impl ImageSet {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            created_by: row.try_get("created_by")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

/// One image with its ground-truth label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: i64,
    pub image_set_id: i64,
    /// Path relative to the media root
    pub file_path: String,
    pub original_filename: String,
    pub is_real: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl Image {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            image_set_id: row.try_get("image_set_id")?,
            file_path: row.try_get("file_path")?,
            original_filename: row.try_get("original_filename")?,
            is_real: row.try_get("is_real")?,
            uploaded_at: row.try_get("uploaded_at")?,
        })
    }
}

/// Binding of one clinician to (a subset of) one image set
///
/// `is_completed`/`completed_at` cache the last progress recomputation;
/// the image subset lives in the `assignment_images` link table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub clinician_id: i64,
    pub image_set_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<i64>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            clinician_id: row.try_get("clinician_id")?,
            image_set_id: row.try_get("image_set_id")?,
            assigned_at: row.try_get("assigned_at")?,
            assigned_by: row.try_get("assigned_by")?,
            is_completed: row.try_get("is_completed")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// A clinician's verdict on one image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub id: i64,
    pub clinician_id: i64,
    pub image_id: i64,
    /// The clinician's guess: true for real, false for synthetic
    pub is_real: bool,
    pub confidence: i64,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            clinician_id: row.try_get("clinician_id")?,
            image_id: row.try_get("image_id")?,
            is_real: row.try_get("is_real")?,
            confidence: row.try_get("confidence")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Single-use registration token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub token: Uuid,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let token: String = row.try_get("token")?;
        let token = Uuid::parse_str(&token).map_err(|e| sqlx::Error::ColumnDecode {
            index: "token".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            token,
            is_used: row.try_get("is_used")?,
            created_at: row.try_get("created_at")?,
            used_at: row.try_get("used_at")?,
        })
    }
}
