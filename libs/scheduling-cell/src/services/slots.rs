use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::with_timeout;

use crate::error::SchedulingError;
use crate::models::{Appointment, AvailabilityWindow, Slot};
use crate::services::calendar::AvailabilityCalendar;
use crate::services::readers::{AppointmentReader, AvailabilityReader};
use crate::services::supabase::{SupabaseAppointmentStore, SupabaseAvailabilityStore};

pub const SLOT_MINUTES: i64 = 30;

/// One day of increments; an overnight window can never need more.
const MAX_STEPS_PER_WINDOW: usize = (24 * 60 / SLOT_MINUTES) as usize;

/// Pure slot arithmetic shared by every booking flow.
pub struct SlotGenerator;

impl SlotGenerator {
    /// Free slots for `date`: every window's candidates, minus booked times,
    /// ascending and de-duplicated across overlapping windows.
    ///
    /// Candidates an overnight window produces after midnight are still
    /// dated `date`: Friday 22:00-02:00 yields Friday 00:00-01:30, which is
    /// earlier than the window's opening. Callers booking those slots get
    /// an appointment on `date` at that clock time.
    pub fn generate(
        date: NaiveDate,
        windows: &[AvailabilityWindow],
        booked: &HashSet<NaiveTime>,
    ) -> Vec<Slot> {
        let free: BTreeSet<NaiveTime> = windows
            .iter()
            .flat_map(Self::window_candidates)
            .filter(|time| !booked.contains(time))
            .collect();

        free.into_iter().map(|time| Slot { date, time }).collect()
    }

    /// Candidate start times of one window, in window order.
    pub fn window_candidates(window: &AvailabilityWindow) -> Vec<NaiveTime> {
        let step = Duration::minutes(SLOT_MINUTES);
        let (start, end) = (window.start_time, window.end_time);
        let mut candidates = Vec::new();

        if window.is_zero_length() {
            return candidates;
        }

        let mut clock = start;
        if !window.is_overnight() {
            while clock < end {
                candidates.push(clock);
                let (next, wrapped) = clock.overflowing_add_signed(step);
                if wrapped != 0 {
                    break;
                }
                clock = next;
            }
            return candidates;
        }

        let mut past_midnight = false;
        for _ in 0..MAX_STEPS_PER_WINDOW {
            if past_midnight && clock >= end {
                break;
            }
            candidates.push(clock);
            let (next, wrapped) = clock.overflowing_add_signed(step);
            if wrapped != 0 {
                past_midnight = true;
            }
            clock = next;
        }

        candidates
    }
}

/// Times held by appointments that have not been cancelled.
pub fn booked_times(appointments: &[Appointment]) -> HashSet<NaiveTime> {
    appointments
        .iter()
        .filter(|a| a.holds_slot())
        .map(|a| a.time)
        .collect()
}

pub struct SlotService {
    calendar: AvailabilityCalendar,
    appointments: Arc<dyn AppointmentReader>,
    io_timeout: StdDuration,
}

impl SlotService {
    pub fn new(
        availability: Arc<dyn AvailabilityReader>,
        appointments: Arc<dyn AppointmentReader>,
        io_timeout: StdDuration,
    ) -> Self {
        Self {
            calendar: AvailabilityCalendar::new(availability),
            appointments,
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

    pub fn calendar(&self) -> &AvailabilityCalendar {
        &self.calendar
    }

    /// Bookable slots for a clinician on `date`. Dates before `today` have
    /// nothing bookable.
    pub async fn generate_slots(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<Slot>, SchedulingError> {
        debug!("Calculating available slots for clinician {} on {}", clinician_id, date);

        if date < today {
            debug!("Requested date {} is before {}, no slots", date, today);
            return Ok(vec![]);
        }

        let day_of_week = AvailabilityCalendar::day_of_week(date);
        let windows = with_timeout(
            self.io_timeout,
            "availability lookup",
            self.calendar.get_windows(clinician_id, day_of_week),
        )
        .await?;

        if windows.is_empty() {
            debug!("No availability for clinician {} on day {}", clinician_id, day_of_week);
            return Ok(vec![]);
        }

        let appointments = with_timeout(
            self.io_timeout,
            "appointment lookup",
            self.appointments.active_appointments_on(clinician_id, date),
        )
        .await?;

        let slots = SlotGenerator::generate(date, &windows, &booked_times(&appointments));
        debug!("Found {} available slots", slots.len());

        Ok(slots)
    }
}
