use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use scheduling_cell::ClinicianScope;
use shared_database::DatabaseError;

use crate::models::{PersistedQueueEntry, QueueStatus};
use crate::services::store::{PatientResolver, QueueStore};

/// Process-local queue with the same one-row-per-appointment rule as the
/// `queue_entries` table.
#[derive(Default)]
pub struct InMemoryQueueStore {
    entries: RwLock<HashMap<Uuid, PersistedQueueEntry>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PersistedQueueEntry> {
        newest_first(self.entries.read().await.values().cloned().collect())
    }
}

fn newest_first(mut entries: Vec<PersistedQueueEntry>) -> Vec<PersistedQueueEntry> {
    entries.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at).then_with(|| a.id.cmp(&b.id)));
    entries
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert_if_absent(&self, entry: &PersistedQueueEntry) -> Result<PersistedQueueEntry, DatabaseError> {
        let mut entries = self.entries.write().await;

        let linked_twice = entry.appointment_id.is_some()
            && entries.values().any(|e| e.appointment_id == entry.appointment_id);

        if linked_twice || entries.contains_key(&entry.id) {
            return Err(DatabaseError::Conflict(format!(
                "queue entry for {:?} already exists",
                entry.appointment_id
            )));
        }

        entries.insert(entry.id, entry.clone());
        Ok(entry.clone())
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: QueueStatus,
        target: QueueStatus,
    ) -> Result<Option<PersistedQueueEntry>, DatabaseError> {
        let mut entries = self.entries.write().await;

        match entries.get_mut(&id) {
            Some(entry) if entry.status == expected => {
                entry.status = target;
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<PersistedQueueEntry>, DatabaseError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn entries_for_appointments(&self, appointment_ids: &[Uuid]) -> Result<Vec<PersistedQueueEntry>, DatabaseError> {
        let entries = self.entries.read().await;
        Ok(newest_first(
            entries
                .values()
                .filter(|e| e.appointment_id.map_or(false, |id| appointment_ids.contains(&id)))
                .cloned()
                .collect(),
        ))
    }

    async fn list_entries(
        &self,
        scope: ClinicianScope,
        status: Option<QueueStatus>,
    ) -> Result<Vec<PersistedQueueEntry>, DatabaseError> {
        let entries = self.entries.read().await;
        Ok(newest_first(
            entries
                .values()
                .filter(|e| scope.includes(e.clinician_id))
                .filter(|e| status.map_or(true, |s| e.status == s))
                .cloned()
                .collect(),
        ))
    }
}

/// Patient records keyed by both their own id and their user id.
#[derive(Default)]
pub struct InMemoryPatientResolver {
    patients: RwLock<HashMap<Uuid, Uuid>>,
}

impl InMemoryPatientResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, patient_id: Uuid, user_id: Option<Uuid>) {
        let mut patients = self.patients.write().await;
        patients.insert(patient_id, patient_id);
        if let Some(user_id) = user_id {
            patients.insert(user_id, patient_id);
        }
    }
}

#[async_trait]
impl PatientResolver for InMemoryPatientResolver {
    async fn resolve(&self, patient_ref: Uuid) -> Result<Option<Uuid>, DatabaseError> {
        Ok(self.patients.read().await.get(&patient_ref).copied())
    }
}
