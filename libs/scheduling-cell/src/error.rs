use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::AppError;

use crate::models::{hhmm, AppointmentStatus};

#[derive(Error, Debug)]
pub enum SchedulingError {
    /// Availability or appointment store failed or timed out. Never
    /// downgraded to an empty result.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Slot {date} {} is not available", hhmm::format(.time))]
    SlotUnavailable { date: NaiveDate, time: NaiveTime },

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidAppointmentState {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<DatabaseError> for SchedulingError {
    fn from(e: DatabaseError) -> Self {
        SchedulingError::UpstreamUnavailable(e.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::UpstreamUnavailable(_) => AppError::ExternalService(e.to_string()),
            SchedulingError::AppointmentNotFound(_) => AppError::NotFound(e.to_string()),
            SchedulingError::SlotUnavailable { .. } => AppError::Conflict(e.to_string()),
            SchedulingError::InvalidAppointmentState { .. } | SchedulingError::Validation(_) => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}
