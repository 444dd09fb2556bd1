use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use scheduling_cell::ClinicianScope;
use shared_config::AppConfig;
use shared_database::{decode_rows, return_representation, DatabaseError, SupabaseClient};

use crate::models::{PersistedQueueEntry, QueueStatus};
use crate::services::store::{PatientResolver, QueueStore};

/// `queue_entries` table. A unique index on `appointment_id` makes a second
/// insert for the same appointment come back as 409.
pub struct SupabaseQueueStore {
    supabase: SupabaseClient,
}

impl SupabaseQueueStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<PersistedQueueEntry>, DatabaseError> {
        let result: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;
        decode_rows(result)
    }
}

fn push_scope(path: &mut String, scope: ClinicianScope) {
    if let ClinicianScope::Clinician(clinician_id) = scope {
        path.push_str(&format!("&doctor_id=eq.{}", clinician_id));
    }
}

#[async_trait]
impl QueueStore for SupabaseQueueStore {
    async fn insert_if_absent(&self, entry: &PersistedQueueEntry) -> Result<PersistedQueueEntry, DatabaseError> {
        let entry_data = json!({
            "id": entry.id,
            "patient_id": entry.patient_id,
            "appointment_id": entry.appointment_id,
            "doctor_id": entry.clinician_id,
            "status": entry.status,
            "checked_in_at": entry.checked_in_at,
            "priority": entry.priority,
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/queue_entries",
                Some(entry_data),
                Some(return_representation()),
            )
            .await?;

        decode_rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode("Insert returned no queue entry".to_string()))
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: QueueStatus,
        target: QueueStatus,
    ) -> Result<Option<PersistedQueueEntry>, DatabaseError> {
        debug!("Updating queue entry {} from {} to {}", id, expected, target);

        let path = format!("/rest/v1/queue_entries?id=eq.{}&status=eq.{}", id, expected);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "status": target })),
                Some(return_representation()),
            )
            .await?;

        Ok(decode_rows(result)?.into_iter().next())
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<PersistedQueueEntry>, DatabaseError> {
        let path = format!("/rest/v1/queue_entries?id=eq.{}", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn entries_for_appointments(&self, appointment_ids: &[Uuid]) -> Result<Vec<PersistedQueueEntry>, DatabaseError> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = appointment_ids.iter().map(Uuid::to_string).collect();
        let path = format!(
            "/rest/v1/queue_entries?appointment_id=in.({})&order=checked_in_at.desc",
            ids.join(",")
        );

        self.fetch(&path).await
    }

    async fn list_entries(
        &self,
        scope: ClinicianScope,
        status: Option<QueueStatus>,
    ) -> Result<Vec<PersistedQueueEntry>, DatabaseError> {
        let mut path = "/rest/v1/queue_entries?order=checked_in_at.desc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        push_scope(&mut path, scope);

        self.fetch(&path).await
    }
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    id: Uuid,
}

pub struct SupabasePatientResolver {
    supabase: SupabaseClient,
}

impl SupabasePatientResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientResolver for SupabasePatientResolver {
    async fn resolve(&self, patient_ref: Uuid) -> Result<Option<Uuid>, DatabaseError> {
        let path = format!(
            "/rest/v1/patients?or=(id.eq.{id},user_id.eq.{id})&select=id&limit=1",
            id = patient_ref
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        let rows: Vec<PatientRow> = decode_rows(result)?;

        Ok(rows.into_iter().next().map(|row| row.id))
    }
}
