//! Database access for imgeval-server
//!
//! All functions take a `&mut SqliteConnection` so they can run either on a
//! pooled connection or inside a transaction (`&mut *tx`).

pub mod assignments;
pub mod clinicians;
pub mod evaluations;
pub mod image_sets;
pub mod images;
pub mod invitations;
