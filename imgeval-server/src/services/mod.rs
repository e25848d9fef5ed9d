//! Domain services
//!
//! Handlers in `api` stay thin; every rule about assignments, progress and
//! evaluations lives here.

pub mod assignments;
pub mod intake;
pub mod notifier;
pub mod passwords;
pub mod progress;
pub mod registration;
pub mod report;
pub mod selector;
pub mod splitter;

pub use notifier::{AssignmentNotice, AssignmentNotifier, LogNotifier};
