use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{with_timeout, DatabaseError};

use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentChange, AppointmentStatus, BookAppointmentRequest, ClinicianScope,
    RescheduleAppointmentRequest,
};
use crate::services::readers::{AppointmentWriter, AvailabilityReader};
use crate::services::slots::{booked_times, SlotService};
use crate::services::supabase::{SupabaseAppointmentStore, SupabaseAvailabilityStore};

/// The authoritative set of appointments. Every booking path goes through
/// the same `SlotService`, so a time is only ever booked if it was offered.
pub struct BookingLedger {
    store: Arc<dyn AppointmentWriter>,
    slots: SlotService,
    io_timeout: Duration,
}

impl BookingLedger {
    pub fn new<S>(availability: Arc<dyn AvailabilityReader>, store: Arc<S>, io_timeout: Duration) -> Self
    where
        S: AppointmentWriter + 'static,
    {
        Self {
            slots: SlotService::new(availability, store.clone(), io_timeout),
            store,
            io_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SupabaseAvailabilityStore::new(config)),
            Arc::new(SupabaseAppointmentStore::new(config)),
            config.request_timeout(),
        )
    }

    pub fn slots(&self) -> &SlotService {
        &self.slots
    }

    pub async fn booked_times(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<HashSet<NaiveTime>, SchedulingError> {
        let appointments = with_timeout(
            self.io_timeout,
            "appointment lookup",
            self.store.active_appointments_on(clinician_id, date),
        )
        .await?;

        Ok(booked_times(&appointments))
    }

    pub async fn due_today(
        &self,
        scope: ClinicianScope,
        today: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = with_timeout(
            self.io_timeout,
            "due appointment lookup",
            self.store.appointments_due(scope, today),
        )
        .await?;

        Ok(appointments)
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        with_timeout(self.io_timeout, "appointment lookup", self.store.get_appointment(id))
            .await?
            .ok_or(SchedulingError::AppointmentNotFound(id))
    }

    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, SchedulingError> {
        debug!(
            "Booking clinician {} on {} at {} for patient {}",
            request.clinician_id, request.date, request.time, request.patient_id
        );

        self.ensure_slot_offered(request.clinician_id, request.date, request.time, today)
            .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            clinician_id: request.clinician_id,
            patient_id: request.patient_id,
            date: request.date,
            time: request.time,
            status: AppointmentStatus::Scheduled,
            reason: request.reason,
        };

        let created = with_timeout(
            self.io_timeout,
            "appointment insert",
            self.store.insert_appointment(&appointment),
        )
        .await
        .map_err(|e| slot_conflict(e, request.date, request.time))?;

        info!("Appointment {} booked for {}", created.id, created.starts_at());
        Ok(created)
    }

    pub async fn confirm(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(id, AppointmentChange::status(AppointmentStatus::Confirmed))
            .await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(id, AppointmentChange::status(AppointmentStatus::Cancelled))
            .await
    }

    /// Moves the appointment to a new offered slot; it stays `RESCHEDULED`
    /// until confirmed again.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get(id).await?;
        ensure_transition(&current, AppointmentStatus::Rescheduled)?;

        self.ensure_slot_offered(current.clinician_id, request.date, request.time, today)
            .await?;

        let change = AppointmentChange {
            status: AppointmentStatus::Rescheduled,
            date: Some(request.date),
            time: Some(request.time),
        };

        let updated = with_timeout(
            self.io_timeout,
            "appointment update",
            self.store.update_appointment_if(id, current.status, &change),
        )
        .await
        .map_err(|e| slot_conflict(e, request.date, request.time))?;

        match updated {
            Some(appointment) => {
                info!("Appointment {} rescheduled to {}", id, appointment.starts_at());
                Ok(appointment)
            }
            None => Err(self.stale_transition(id, AppointmentStatus::Rescheduled).await),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        change: AppointmentChange,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get(id).await?;
        ensure_transition(&current, change.status)?;

        let updated = with_timeout(
            self.io_timeout,
            "appointment update",
            self.store.update_appointment_if(id, current.status, &change),
        )
        .await?;

        match updated {
            Some(appointment) => {
                info!("Appointment {} moved from {} to {}", id, current.status, appointment.status);
                Ok(appointment)
            }
            None => Err(self.stale_transition(id, change.status).await),
        }
    }

    /// Conditional update found a different status; report what it is now.
    async fn stale_transition(&self, id: Uuid, target: AppointmentStatus) -> SchedulingError {
        match self.get(id).await {
            Ok(latest) => {
                warn!("Appointment {} changed concurrently, now {}", id, latest.status);
                SchedulingError::InvalidAppointmentState {
                    from: latest.status,
                    to: target,
                }
            }
            Err(e) => e,
        }
    }

    async fn ensure_slot_offered(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        today: NaiveDate,
    ) -> Result<(), SchedulingError> {
        if date < today {
            return Err(SchedulingError::Validation(format!(
                "Cannot book {} which is before {}",
                date, today
            )));
        }

        let offered = self.slots.generate_slots(clinician_id, date, today).await?;
        if !offered.iter().any(|slot| slot.time == time) {
            warn!("Clinician {} has no free slot at {} {}", clinician_id, date, time);
            return Err(SchedulingError::SlotUnavailable { date, time });
        }

        Ok(())
    }
}

fn ensure_transition(current: &Appointment, target: AppointmentStatus) -> Result<(), SchedulingError> {
    if current.status.can_transition_to(&target) {
        Ok(())
    } else {
        warn!("Invalid appointment transition attempted: {} -> {}", current.status, target);
        Err(SchedulingError::InvalidAppointmentState {
            from: current.status,
            to: target,
        })
    }
}

fn slot_conflict(e: DatabaseError, date: NaiveDate, time: NaiveTime) -> SchedulingError {
    match e {
        DatabaseError::Conflict(_) => SchedulingError::SlotUnavailable { date, time },
        other => other.into(),
    }
}
