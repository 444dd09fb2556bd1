use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentChange, AppointmentStatus, AvailabilityWindow, ClinicianScope};

/// Source of a clinician's recurring weekly windows.
#[async_trait]
pub trait AvailabilityReader: Send + Sync {
    async fn windows_for_day(
        &self,
        clinician_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError>;
}

#[async_trait]
pub trait AppointmentReader: Send + Sync {
    /// Appointments for one clinician and date that still hold their slot.
    async fn active_appointments_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Scheduled or confirmed appointments dated `date`.
    async fn appointments_due(
        &self,
        scope: ClinicianScope,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;
}

#[async_trait]
pub trait AppointmentWriter: AppointmentReader {
    /// Fails with `DatabaseError::Conflict` when another active appointment
    /// already holds the clinician/date/time.
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;

    /// Applies `change` only while the stored status still equals `expected`.
    /// `None` means the row moved on (or vanished) before the write.
    async fn update_appointment_if(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: &AppointmentChange,
    ) -> Result<Option<Appointment>, DatabaseError>;
}
