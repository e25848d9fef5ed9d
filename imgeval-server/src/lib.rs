//! imgeval-server library - clinician image evaluation service
//!
//! Clinicians judge images as real or synthetic; administrators curate image
//! sets, hand out assignments and review accuracy.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use error::{ApiError, ApiResult};

use services::notifier::{AssignmentNotifier, LogNotifier};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Public URL prefix of the media root, always ending in `/`
    pub media_url: String,
    /// Directory served under `media_url`; `None` leaves serving to a proxy
    pub media_root: Option<PathBuf>,
    /// Receives new-assignment notices
    pub notifier: Arc<dyn AssignmentNotifier>,
    /// Server startup time, for uptime
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state with the logging notifier
    pub fn new(db: SqlitePool, media_url: impl Into<String>, media_root: Option<PathBuf>) -> Self {
        Self {
            db,
            media_url: media_url.into(),
            media_root,
            notifier: Arc::new(LogNotifier),
            startup_time: Utc::now(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AssignmentNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Public URL for a media-relative path
    pub fn media_link(&self, file_path: &str) -> String {
        format!("{}{}", self.media_url, file_path.trim_start_matches('/'))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(api::health_routes())
        .merge(api::clinician_routes())
        .merge(api::admin_routes());

    if let Some(root) = &state.media_root {
        let prefix = state.media_url.trim_end_matches('/');
        if prefix.starts_with('/') && !prefix.is_empty() {
            router = router.nest_service(prefix, ServeDir::new(root));
        }
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
