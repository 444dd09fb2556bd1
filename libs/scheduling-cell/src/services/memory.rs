use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{
    Appointment, AppointmentChange, AppointmentStatus, AvailabilityWindow, ClinicianScope,
};
use crate::services::readers::{AppointmentReader, AppointmentWriter, AvailabilityReader};

/// Process-local availability, for tests and local runs without Supabase.
#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    windows: RwLock<Vec<AvailabilityWindow>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_window(&self, window: AvailabilityWindow) {
        self.windows.write().await.push(window);
    }
}

#[async_trait]
impl AvailabilityReader for InMemoryAvailabilityStore {
    async fn windows_for_day(
        &self,
        clinician_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError> {
        let windows = self.windows.read().await;
        Ok(windows
            .iter()
            .filter(|w| w.clinician_id == clinician_id && w.day_of_week == day_of_week)
            .cloned()
            .collect())
    }
}

/// Process-local appointment ledger with the same uniqueness rule as the
/// appointments table: one slot-holding appointment per clinician/date/time.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.starts_at(), a.id));
    appointments
}

fn slot_taken(appointments: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
    appointments.values().any(|a| {
        a.id != candidate.id
            && a.holds_slot()
            && a.clinician_id == candidate.clinician_id
            && a.date == candidate.date
            && a.time == candidate.time
    })
}

#[async_trait]
impl AppointmentReader for InMemoryAppointmentStore {
    async fn active_appointments_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| a.clinician_id == clinician_id && a.date == date && a.holds_slot())
                .cloned()
                .collect(),
        ))
    }

    async fn appointments_due(
        &self,
        scope: ClinicianScope,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| scope.includes(a.clinician_id) && a.date == date && a.status.is_due())
                .cloned()
                .collect(),
        ))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl AppointmentWriter for InMemoryAppointmentStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) || slot_taken(&appointments, appointment) {
            return Err(DatabaseError::Conflict(format!(
                "slot {} {} already held",
                appointment.date, appointment.time
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_appointment_if(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: &AppointmentChange,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut appointments = self.appointments.write().await;

        let mut updated = match appointments.get(&id) {
            Some(current) if current.status == expected => current.clone(),
            _ => return Ok(None),
        };
        change.apply_to(&mut updated);

        if updated.holds_slot() && slot_taken(&appointments, &updated) {
            return Err(DatabaseError::Conflict(format!(
                "slot {} {} already held",
                updated.date, updated.time
            )));
        }

        appointments.insert(id, updated.clone());
        Ok(Some(updated))
    }
}
