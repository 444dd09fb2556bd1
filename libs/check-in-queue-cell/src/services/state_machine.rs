use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use scheduling_cell::{Appointment, AppointmentReader};
use shared_database::{with_timeout, DatabaseError};

use crate::error::QueueError;
use crate::models::{EntryRef, PersistedQueueEntry, Priority, QueueStatus};
use crate::services::store::{PatientResolver, QueueStore};

/// Minutes after the appointment start during which the patient can still be
/// taken into consultation.
pub const CONSULTATION_GRACE_MINUTES: i64 = 30;

/// Where `now` sits relative to an appointment's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGate {
    pub arrived: bool,
    pub expired: bool,
}

impl TimeGate {
    pub fn at(appointment_start: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self {
            arrived: now >= appointment_start,
            expired: now > appointment_start + Duration::minutes(CONSULTATION_GRACE_MINUTES),
        }
    }
}

/// Checks a status change against status order and, for appointment-linked
/// entries, the time gate. Walk-ins pass `None` and are never gated.
pub fn validate(
    current: QueueStatus,
    target: QueueStatus,
    appointment_start: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<(), QueueError> {
    let reject = |reason: &str| QueueError::InvalidTransition {
        from: current,
        to: target,
        reason: reason.to_string(),
    };

    if current == target {
        return Err(reject("entry already has this status"));
    }
    if !current.can_advance_to(&target) {
        return Err(reject("queue status only moves forward"));
    }

    let gate = match appointment_start {
        Some(start) => TimeGate::at(start, now),
        None => return Ok(()),
    };

    match (current, target) {
        (QueueStatus::Waiting, QueueStatus::InConsultation) if !gate.arrived => {
            Err(reject("appointment has not started yet"))
        }
        (QueueStatus::Waiting, QueueStatus::InConsultation) if gate.expired => {
            Err(reject("appointment window has passed, only completion is allowed"))
        }
        (QueueStatus::Waiting, QueueStatus::Completed) if !gate.expired => {
            Err(reject("appointment is still within its consultation window"))
        }
        _ => Ok(()),
    }
}

pub struct QueueStateMachine {
    store: Arc<dyn QueueStore>,
    patients: Arc<dyn PatientResolver>,
    appointments: Arc<dyn AppointmentReader>,
    io_timeout: StdDuration,
}

impl QueueStateMachine {
    pub fn new(
        store: Arc<dyn QueueStore>,
        patients: Arc<dyn PatientResolver>,
        appointments: Arc<dyn AppointmentReader>,
        io_timeout: StdDuration,
    ) -> Self {
        Self {
            store,
            patients,
            appointments,
            io_timeout,
        }
    }

    /// Applies an operator action. A virtual entry is materialized first,
    /// but only once the gate allows the action, so a rejected action leaves
    /// nothing behind.
    pub async fn apply(
        &self,
        entry: EntryRef,
        target: QueueStatus,
        now: NaiveDateTime,
    ) -> Result<PersistedQueueEntry, QueueError> {
        match entry {
            EntryRef::Persisted(id) => {
                let current = self.load_entry(id).await?;
                let start = match current.appointment_id {
                    Some(appointment_id) => Some(self.load_appointment(appointment_id).await?.starts_at()),
                    None => None,
                };
                self.advance(current, target, start, now).await
            }
            EntryRef::Appointment(appointment_id) => {
                let appointment = self.load_appointment(appointment_id).await?;
                ensure_awaiting_check_in(&appointment, now)?;
                validate(QueueStatus::Waiting, target, Some(appointment.starts_at()), now)?;

                let materialized = self.materialize(&appointment, Priority::Normal, now).await?;
                self.advance(materialized, target, Some(appointment.starts_at()), now)
                    .await
            }
        }
    }

    /// Persists a WAITING entry for an appointment. Exactly one caller wins
    /// per appointment; the rest get `DuplicateQueueEntry`.
    pub async fn materialize(
        &self,
        appointment: &Appointment,
        priority: Priority,
        now: NaiveDateTime,
    ) -> Result<PersistedQueueEntry, QueueError> {
        let patient_id = self.resolve_patient(appointment.patient_id).await?;

        let entry = PersistedQueueEntry::waiting(
            patient_id,
            Some(appointment.id),
            appointment.clinician_id,
            now,
            priority,
        );

        let created = with_timeout(self.io_timeout, "queue entry insert", self.store.insert_if_absent(&entry))
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    warn!("Appointment {} was already materialized", appointment.id);
                    QueueError::DuplicateQueueEntry(appointment.id)
                }
                other => other.into(),
            })?;

        info!("Materialized queue entry {} for appointment {}", created.id, appointment.id);
        Ok(created)
    }

    pub async fn resolve_patient(&self, patient_ref: Uuid) -> Result<Uuid, QueueError> {
        with_timeout(self.io_timeout, "patient lookup", self.patients.resolve(patient_ref))
            .await?
            .ok_or(QueueError::PatientNotFound(patient_ref))
    }

    async fn advance(
        &self,
        current: PersistedQueueEntry,
        target: QueueStatus,
        appointment_start: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Result<PersistedQueueEntry, QueueError> {
        if let Err(e) = validate(current.status, target, appointment_start, now) {
            warn!("Rejected queue transition for {}: {}", current.id, e);
            return Err(e);
        }

        let updated = with_timeout(
            self.io_timeout,
            "queue status update",
            self.store.update_status_if(current.id, current.status, target),
        )
        .await?;

        match updated {
            Some(entry) => {
                info!("Queue entry {} moved from {} to {}", entry.id, current.status, entry.status);
                Ok(entry)
            }
            None => {
                let latest = self.load_entry(current.id).await?;
                warn!("Queue entry {} changed concurrently, now {}", latest.id, latest.status);
                Err(QueueError::InvalidTransition {
                    from: latest.status,
                    to: target,
                    reason: "entry was updated by another operator".to_string(),
                })
            }
        }
    }

    async fn load_entry(&self, id: Uuid) -> Result<PersistedQueueEntry, QueueError> {
        with_timeout(self.io_timeout, "queue entry lookup", self.store.get_entry(id))
            .await?
            .ok_or(QueueError::EntryNotFound(id))
    }

    async fn load_appointment(&self, id: Uuid) -> Result<Appointment, QueueError> {
        debug!("Loading appointment {} for queue gating", id);
        with_timeout(self.io_timeout, "appointment lookup", self.appointments.get_appointment(id))
            .await?
            .ok_or(QueueError::AppointmentNotFound(id))
    }
}

/// Only appointments still due today can enter the queue.
pub(crate) fn ensure_awaiting_check_in(appointment: &Appointment, now: NaiveDateTime) -> Result<(), QueueError> {
    if !appointment.status.is_due() {
        return Err(QueueError::Validation(format!(
            "Appointment {} is {} and cannot be checked in",
            appointment.id, appointment.status
        )));
    }
    if appointment.date != now.date() {
        return Err(QueueError::Validation(format!(
            "Appointment {} is dated {}, not today",
            appointment.id, appointment.date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use scheduling_cell::hhmm;

    fn at(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_time(hhmm::parse(time).unwrap())
    }

    #[test]
    fn test_gate_boundaries() {
        let start = at("14:00");
        assert_eq!(TimeGate::at(start, at("13:59")), TimeGate { arrived: false, expired: false });
        assert_eq!(TimeGate::at(start, at("14:00")), TimeGate { arrived: true, expired: false });
        assert_eq!(TimeGate::at(start, at("14:30")), TimeGate { arrived: true, expired: false });
        assert_eq!(TimeGate::at(start, at("14:31")), TimeGate { arrived: true, expired: true });
    }

    #[test]
    fn test_consultation_before_start_is_rejected() {
        let result = validate(QueueStatus::Waiting, QueueStatus::InConsultation, Some(at("14:00")), at("13:55"));
        assert_matches!(
            result,
            Err(QueueError::InvalidTransition { from: QueueStatus::Waiting, to: QueueStatus::InConsultation, .. })
        );
    }

    #[test]
    fn test_consultation_inside_window_is_allowed() {
        assert!(validate(QueueStatus::Waiting, QueueStatus::InConsultation, Some(at("14:00")), at("14:05")).is_ok());
    }

    #[test]
    fn test_expired_entry_can_only_complete() {
        let start = Some(at("14:00"));
        assert!(validate(QueueStatus::Waiting, QueueStatus::InConsultation, start, at("14:35")).is_err());
        assert!(validate(QueueStatus::Waiting, QueueStatus::Completed, start, at("14:35")).is_ok());
        assert!(validate(QueueStatus::Waiting, QueueStatus::Completed, start, at("14:10")).is_err());
    }

    #[test]
    fn test_consultation_can_always_complete() {
        for now in ["13:00", "14:10", "23:00"] {
            assert!(validate(QueueStatus::InConsultation, QueueStatus::Completed, Some(at("14:00")), at(now)).is_ok());
        }
    }

    #[test]
    fn test_walk_ins_are_not_gated() {
        assert!(validate(QueueStatus::Waiting, QueueStatus::InConsultation, None, at("06:00")).is_ok());
        assert!(validate(QueueStatus::Waiting, QueueStatus::Completed, None, at("06:00")).is_ok());
    }

    #[test]
    fn test_transitions_never_go_backwards() {
        let statuses = [QueueStatus::Waiting, QueueStatus::InConsultation, QueueStatus::Completed];
        for (i, from) in statuses.iter().enumerate() {
            for (j, to) in statuses.iter().enumerate() {
                if j <= i {
                    assert!(validate(*from, *to, None, at("12:00")).is_err(), "{} -> {}", from, to);
                }
            }
        }
    }
}
