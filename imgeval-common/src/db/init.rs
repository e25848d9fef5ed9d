//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to date.
//! Every statement is idempotent, so this runs on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys are per-connection in SQLite, so they are set on the
    // connect options rather than with a one-off PRAGMA
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_clinicians_table(pool).await?;
    create_invitations_table(pool).await?;
    create_image_sets_table(pool).await?;
    create_images_table(pool).await?;
    create_assignments_table(pool).await?;
    create_assignment_images_table(pool).await?;
    create_evaluations_table(pool).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_clinicians_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clinicians (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            workplace TEXT NOT NULL DEFAULT '',
            years_experience INTEGER NOT NULL DEFAULT 0 CHECK (years_experience >= 0),
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_invitations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invitations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL UNIQUE,
            is_used INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            used_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_image_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_sets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMP NOT NULL,
            created_by INTEGER REFERENCES clinicians(id) ON DELETE SET NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_set_id INTEGER NOT NULL REFERENCES image_sets(id) ON DELETE CASCADE,
            file_path TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            is_real INTEGER NOT NULL,
            uploaded_at TIMESTAMP NOT NULL,
            UNIQUE (image_set_id, original_filename)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_image_set ON images(image_set_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            clinician_id INTEGER NOT NULL REFERENCES clinicians(id) ON DELETE CASCADE,
            image_set_id INTEGER NOT NULL REFERENCES image_sets(id) ON DELETE CASCADE,
            assigned_at TIMESTAMP NOT NULL,
            assigned_by INTEGER REFERENCES clinicians(id) ON DELETE SET NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            completed_at TIMESTAMP,
            UNIQUE (clinician_id, image_set_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Link table for the optional image subset of an assignment
async fn create_assignment_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignment_images (
            assignment_id INTEGER NOT NULL REFERENCES assignments(id) ON DELETE CASCADE,
            image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
            PRIMARY KEY (assignment_id, image_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One evaluation per (clinician, image) is enforced here, not only in the
/// intake service; concurrent duplicate inserts are rejected by SQLite.
async fn create_evaluations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            clinician_id INTEGER NOT NULL REFERENCES clinicians(id) ON DELETE CASCADE,
            image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
            is_real INTEGER NOT NULL,
            confidence INTEGER NOT NULL CHECK (confidence BETWEEN 1 AND 5),
            created_at TIMESTAMP NOT NULL,
            UNIQUE (clinician_id, image_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_evaluations_image ON evaluations(image_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
