//! HTTP API handlers for imgeval-server

pub mod admin;
pub mod assignments;
pub mod evaluations;
pub mod health;
pub mod identity;
pub mod invitations;
pub mod next_image;
pub mod profile;
pub mod registration;

pub use health::health_routes;
pub use identity::{AdminClinician, CurrentClinician, CLINICIAN_HEADER};

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Routes for invited and registered clinicians
pub fn clinician_routes() -> Router<AppState> {
    Router::new()
        .route("/api/validate-token", post(invitations::validate_token))
        .route("/api/register", post(registration::register))
        .route(
            "/api/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/api/submit-evaluation", post(evaluations::submit_evaluation))
        .route("/api/next-image", get(next_image::next_image))
        .route("/api/assignments", get(assignments::list_assignments))
}

/// Routes restricted to administrators
pub fn admin_routes() -> Router<AppState> {
    use axum::routing::put;

    Router::new()
        .route("/api/admin/image-sets", get(admin::list_image_sets))
        .route("/api/admin/image-sets/:id/active", put(admin::set_image_set_active))
        .route("/api/admin/image-sets/:id/split", post(admin::split_image_set))
        .route("/api/admin/assignments", post(admin::create_assignment))
        .route("/api/admin/report", get(admin::report))
        .route("/api/admin/evaluations/export", get(admin::export_evaluations))
        .route(
            "/api/admin/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
}
