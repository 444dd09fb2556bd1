use thiserror::Error;
use uuid::Uuid;

use scheduling_cell::SchedulingError;
use shared_database::DatabaseError;
use shared_models::AppError;

use crate::models::QueueStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("No patient record for {0}")]
    PatientNotFound(Uuid),

    #[error("Invalid queue transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: QueueStatus,
        to: QueueStatus,
        reason: String,
    },

    /// Another operator already materialized or checked in this appointment.
    #[error("Appointment {0} already has a queue entry")]
    DuplicateQueueEntry(Uuid),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<DatabaseError> for QueueError {
    fn from(e: DatabaseError) -> Self {
        QueueError::UpstreamUnavailable(e.to_string())
    }
}

impl From<SchedulingError> for QueueError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::UpstreamUnavailable(msg) => QueueError::UpstreamUnavailable(msg),
            SchedulingError::AppointmentNotFound(id) => QueueError::AppointmentNotFound(id),
            other => QueueError::Validation(other.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::PatientNotFound(_)
            | QueueError::EntryNotFound(_)
            | QueueError::AppointmentNotFound(_) => AppError::NotFound(e.to_string()),
            QueueError::InvalidTransition { .. } | QueueError::Validation(_) => {
                AppError::BadRequest(e.to_string())
            }
            QueueError::DuplicateQueueEntry(_) => AppError::Conflict(e.to_string()),
            QueueError::UpstreamUnavailable(_) => AppError::ExternalService(e.to_string()),
        }
    }
}
