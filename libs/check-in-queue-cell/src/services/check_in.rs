use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use futures::try_join;
use tracing::{debug, info};
use uuid::Uuid;

use scheduling_cell::{AppointmentReader, ClinicianScope, SupabaseAppointmentStore};
use shared_config::AppConfig;
use shared_database::with_timeout;

use crate::error::QueueError;
use crate::models::{CheckInRequest, EntryRef, PersistedQueueEntry, QueueEntry, QueueStatus};
use crate::services::projector::QueueProjector;
use crate::services::state_machine::{ensure_awaiting_check_in, QueueStateMachine};
use crate::services::store::{PatientResolver, QueueStore};
use crate::services::supabase::{SupabasePatientResolver, SupabaseQueueStore};

/// The front-desk queue: check-ins, the merged "who is next" view, and
/// operator transitions.
pub struct CheckInQueue {
    store: Arc<dyn QueueStore>,
    appointments: Arc<dyn AppointmentReader>,
    state_machine: QueueStateMachine,
    io_timeout: Duration,
}

impl CheckInQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        patients: Arc<dyn PatientResolver>,
        appointments: Arc<dyn AppointmentReader>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            state_machine: QueueStateMachine::new(store.clone(), patients, appointments.clone(), io_timeout),
            store,
            appointments,
            io_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SupabaseQueueStore::new(config)),
            Arc::new(SupabasePatientResolver::new(config)),
            Arc::new(SupabaseAppointmentStore::new(config)),
            config.request_timeout(),
        )
    }

    pub fn state_machine(&self) -> &QueueStateMachine {
        &self.state_machine
    }

    /// Every waiting entry in scope, whatever day it was checked in, plus
    /// today's appointments nobody has checked in yet, newest first.
    pub async fn project_queue(
        &self,
        scope: ClinicianScope,
        today: NaiveDate,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let (waiting, due) = try_join!(
            with_timeout(
                self.io_timeout,
                "queue lookup",
                self.store.list_entries(scope, Some(QueueStatus::Waiting))
            ),
            with_timeout(
                self.io_timeout,
                "due appointment lookup",
                self.appointments.appointments_due(scope, today)
            ),
        )?;

        let due_ids: Vec<Uuid> = due.iter().map(|a| a.id).collect();
        let claims = with_timeout(
            self.io_timeout,
            "appointment claim lookup",
            self.store.entries_for_appointments(&due_ids),
        )
        .await?;

        let mut persisted = waiting;
        persisted.extend(claims);

        let queue = QueueProjector::project(&persisted, &due);
        debug!(
            "Projected {} queue entries from {} stored and {} due",
            queue.len(),
            persisted.len(),
            due.len()
        );

        Ok(queue)
    }

    pub async fn apply_transition(
        &self,
        entry: EntryRef,
        target: QueueStatus,
        now: NaiveDateTime,
    ) -> Result<PersistedQueueEntry, QueueError> {
        self.state_machine.apply(entry, target, now).await
    }

    pub async fn check_in(
        &self,
        request: CheckInRequest,
        now: NaiveDateTime,
    ) -> Result<PersistedQueueEntry, QueueError> {
        let priority = request.priority.unwrap_or_default();

        if let Some(appointment_id) = request.appointment_id {
            let appointment = with_timeout(
                self.io_timeout,
                "appointment lookup",
                self.appointments.get_appointment(appointment_id),
            )
            .await?
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;

            ensure_awaiting_check_in(&appointment, now)?;
            return self.state_machine.materialize(&appointment, priority, now).await;
        }

        let (patient_ref, clinician_id) = match (request.patient_id, request.clinician_id) {
            (Some(patient_ref), Some(clinician_id)) => (patient_ref, clinician_id),
            _ => {
                return Err(QueueError::Validation(
                    "Walk-in check-in requires patient_id and clinician_id".to_string(),
                ))
            }
        };

        let patient_id = self.state_machine.resolve_patient(patient_ref).await?;
        let entry = PersistedQueueEntry::waiting(patient_id, None, clinician_id, now, priority);

        let created = with_timeout(self.io_timeout, "queue entry insert", self.store.insert_if_absent(&entry)).await?;
        info!("Walk-in {} checked in for clinician {}", created.patient_id, clinician_id);

        Ok(created)
    }

    pub async fn list_entries(
        &self,
        scope: ClinicianScope,
        status: Option<QueueStatus>,
    ) -> Result<Vec<PersistedQueueEntry>, QueueError> {
        let entries = with_timeout(self.io_timeout, "queue lookup", self.store.list_entries(scope, status)).await?;
        Ok(entries)
    }

    pub async fn get_entry(&self, id: Uuid) -> Result<PersistedQueueEntry, QueueError> {
        with_timeout(self.io_timeout, "queue entry lookup", self.store.get_entry(id))
            .await?
            .ok_or(QueueError::EntryNotFound(id))
    }
}
