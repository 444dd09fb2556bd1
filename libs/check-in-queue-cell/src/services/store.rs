use async_trait::async_trait;
use uuid::Uuid;

use scheduling_cell::ClinicianScope;
use shared_database::DatabaseError;

use crate::models::{PersistedQueueEntry, QueueStatus};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Stores a new entry. Fails with `DatabaseError::Conflict` when the
    /// entry's appointment already has a row; walk-ins never conflict.
    async fn insert_if_absent(&self, entry: &PersistedQueueEntry) -> Result<PersistedQueueEntry, DatabaseError>;

    /// Moves an entry to `target` only while its stored status is still
    /// `expected`. `None` when the row changed first.
    async fn update_status_if(
        &self,
        id: Uuid,
        expected: QueueStatus,
        target: QueueStatus,
    ) -> Result<Option<PersistedQueueEntry>, DatabaseError>;

    async fn get_entry(&self, id: Uuid) -> Result<Option<PersistedQueueEntry>, DatabaseError>;

    /// Every entry linked to one of `appointment_ids`, whatever its status
    /// or check-in day.
    async fn entries_for_appointments(&self, appointment_ids: &[Uuid]) -> Result<Vec<PersistedQueueEntry>, DatabaseError>;

    async fn list_entries(
        &self,
        scope: ClinicianScope,
        status: Option<QueueStatus>,
    ) -> Result<Vec<PersistedQueueEntry>, DatabaseError>;
}

/// Maps the patient reference carried by an appointment or check-in (a
/// patient id or the patient's user id) to a patient record.
#[async_trait]
pub trait PatientResolver: Send + Sync {
    async fn resolve(&self, patient_ref: Uuid) -> Result<Option<Uuid>, DatabaseError>;
}
