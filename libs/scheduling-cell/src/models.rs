use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serde codec for wall-clock times. Writes `HH:MM`; reads `HH:MM` or the
/// `HH:MM:SS` form PostgREST returns for `time` columns.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, FORMAT))
            .map_err(|_| format!("invalid time '{}', expected HH:MM", raw))
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    #[serde(alias = "doctor_id")]
    pub clinician_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl AvailabilityWindow {
    pub fn is_overnight(&self) -> bool {
        self.end_time < self.start_time
    }

    pub fn is_zero_length(&self) -> bool {
        self.end_time == self.start_time
    }

    /// Whether a start time falls inside the window, wrapping past midnight
    /// for overnight windows.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.is_zero_length() {
            false
        } else if self.is_overnight() {
            time >= self.start_time || time < self.end_time
        } else {
            time >= self.start_time && time < self.end_time
        }
    }
}

/// One bookable start time. Derived from availability, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Scheduled or confirmed appointments are expected to turn up today.
    pub fn is_due(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[Confirmed, Cancelled, Rescheduled, Completed],
            Confirmed => &[Completed, Cancelled, Rescheduled],
            Rescheduled => &[Confirmed, Cancelled, Rescheduled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: &AppointmentStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(alias = "doctor_id")]
    pub clinician_id: Uuid,
    pub patient_id: Uuid,
    #[serde(alias = "appointment_date")]
    pub date: NaiveDate,
    #[serde(alias = "appointment_time", with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Cancelled appointments release their slot; everything else holds it.
    pub fn holds_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// Which clinicians a ledger or queue query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicianScope {
    Clinician(Uuid),
    All,
}

impl ClinicianScope {
    pub fn includes(&self, clinician_id: Uuid) -> bool {
        match self {
            ClinicianScope::Clinician(id) => *id == clinician_id,
            ClinicianScope::All => true,
        }
    }
}

impl From<Option<Uuid>> for ClinicianScope {
    fn from(clinician_id: Option<Uuid>) -> Self {
        clinician_id.map_or(ClinicianScope::All, ClinicianScope::Clinician)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub clinician_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

/// Fields a conditional appointment update may change.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentChange {
    pub status: AppointmentStatus,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl AppointmentChange {
    pub fn status(status: AppointmentStatus) -> Self {
        Self { status, date: None, time: None }
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        appointment.status = self.status;
        if let Some(date) = self.date {
            appointment.date = date;
        }
        if let Some(time) = self.time {
            appointment.time = time;
        }
    }
}
