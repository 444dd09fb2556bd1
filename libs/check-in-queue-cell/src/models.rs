use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use scheduling_cell::{hhmm, Appointment};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    InConsultation,
    Completed,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed)
    }

    /// Status only moves forward. Skipping consultation is allowed for
    /// entries that never get seen.
    pub fn can_advance_to(&self, target: &QueueStatus) -> bool {
        use QueueStatus::*;
        matches!(
            (self, target),
            (Waiting, InConsultation) | (Waiting, Completed) | (InConsultation, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "WAITING",
            QueueStatus::InConsultation => "IN_CONSULTATION",
            QueueStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A row of the `queue_entries` table. `appointment_id` is null for walk-ins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedQueueEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    #[serde(alias = "doctor_id")]
    pub clinician_id: Uuid,
    pub status: QueueStatus,
    pub checked_in_at: NaiveDateTime,
    #[serde(default)]
    pub priority: Priority,
}

impl PersistedQueueEntry {
    pub fn waiting(
        patient_id: Uuid,
        appointment_id: Option<Uuid>,
        clinician_id: Uuid,
        checked_in_at: NaiveDateTime,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            appointment_id,
            clinician_id,
            status: QueueStatus::Waiting,
            checked_in_at,
            priority,
        }
    }

    pub fn is_walk_in(&self) -> bool {
        self.appointment_id.is_none()
    }
}

/// Queue-shaped view of an appointment due today that nobody has checked in
/// yet. Only ever produced by the projector.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VirtualQueueEntry {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub clinician_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub checked_in_at: NaiveDateTime,
    pub status: QueueStatus,
    pub priority: Priority,
}

impl VirtualQueueEntry {
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            clinician_id: appointment.clinician_id,
            appointment_date: appointment.date,
            appointment_time: appointment.time,
            checked_in_at: appointment.starts_at(),
            status: QueueStatus::Waiting,
            priority: Priority::Normal,
        }
    }
}

/// One row of the merged queue. Virtual entries must be materialized before
/// they can change status.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    Virtual(VirtualQueueEntry),
    Persisted(PersistedQueueEntry),
}

impl QueueEntry {
    pub fn is_from_appointment(&self) -> bool {
        matches!(self, QueueEntry::Virtual(_))
    }

    pub fn checked_in_at(&self) -> NaiveDateTime {
        match self {
            QueueEntry::Virtual(entry) => entry.checked_in_at,
            QueueEntry::Persisted(entry) => entry.checked_in_at,
        }
    }

    pub fn appointment_id(&self) -> Option<Uuid> {
        match self {
            QueueEntry::Virtual(entry) => Some(entry.appointment_id),
            QueueEntry::Persisted(entry) => entry.appointment_id,
        }
    }

    pub fn status(&self) -> QueueStatus {
        match self {
            QueueEntry::Virtual(entry) => entry.status,
            QueueEntry::Persisted(entry) => entry.status,
        }
    }

    /// How an operator addresses this entry in a transition request.
    pub fn entry_ref(&self) -> EntryRef {
        match self {
            QueueEntry::Virtual(entry) => EntryRef::Appointment(entry.appointment_id),
            QueueEntry::Persisted(entry) => EntryRef::Persisted(entry.id),
        }
    }

    /// Identity used to break ordering ties.
    pub(crate) fn sort_key(&self) -> Uuid {
        match self {
            QueueEntry::Virtual(entry) => entry.appointment_id,
            QueueEntry::Persisted(entry) => entry.id,
        }
    }
}

impl Serialize for QueueEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a, T> {
            kind: &'static str,
            is_from_appointment: bool,
            #[serde(flatten)]
            entry: &'a T,
        }

        match self {
            QueueEntry::Virtual(entry) => Wire {
                kind: "virtual",
                is_from_appointment: true,
                entry,
            }
            .serialize(serializer),
            QueueEntry::Persisted(entry) => Wire {
                kind: "persisted",
                is_from_appointment: false,
                entry,
            }
            .serialize(serializer),
        }
    }
}

/// Target of a queue action: a stored entry, or a virtual one addressed by
/// its appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntryRef {
    Persisted(Uuid),
    Appointment(Uuid),
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Explicit check-in at the front desk. Either `appointment_id` is set, or
/// both `patient_id` and `clinician_id` are (walk-in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub clinician_id: Option<Uuid>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub entry: EntryRef,
    pub target_status: QueueStatus,
}
