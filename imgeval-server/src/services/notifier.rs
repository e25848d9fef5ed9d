//! New-assignment notifications
//!
//! Delivery (email or otherwise) belongs to an external collaborator behind
//! [`AssignmentNotifier`]. [`LogNotifier`] records the notice in the log.

use serde::Serialize;
use tracing::info;

/// What a clinician is told about a new assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentNotice {
    pub assignment_id: i64,
    pub clinician_username: String,
    pub clinician_email: String,
    pub image_set_name: String,
    pub image_count: usize,
}

/// Sink for new-assignment notifications
///
/// Called after the creating transaction commits; failures are the
/// implementation's concern and never undo the assignment.
pub trait AssignmentNotifier: Send + Sync {
    fn assignment_created(&self, notice: &AssignmentNotice);
}

/// Writes notices to the structured log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl AssignmentNotifier for LogNotifier {
    fn assignment_created(&self, notice: &AssignmentNotice) {
        if notice.clinician_email.is_empty() {
            info!(
                assignment_id = notice.assignment_id,
                "New assignment for {} has no email address on file",
                notice.clinician_username
            );
            return;
        }

        info!(
            assignment_id = notice.assignment_id,
            to = %notice.clinician_email,
            "New assignment: {} has {} images to evaluate in '{}'",
            notice.clinician_username,
            notice.image_count,
            notice.image_set_name
        );
    }
}
