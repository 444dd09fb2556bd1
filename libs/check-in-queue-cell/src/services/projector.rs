use std::collections::HashSet;

use uuid::Uuid;

use scheduling_cell::Appointment;

use crate::models::{PersistedQueueEntry, QueueEntry, QueueStatus, VirtualQueueEntry};

/// Merges today's un-checked-in appointments with the stored queue.
pub struct QueueProjector;

impl QueueProjector {
    /// `persisted` must hold the waiting entries in scope and every entry
    /// linked to a `due` appointment, whatever its status: a consulted or
    /// completed appointment must not reappear as a virtual entry. The same
    /// row may appear twice. Only waiting entries are returned, newest first.
    pub fn project(persisted: &[PersistedQueueEntry], due: &[Appointment]) -> Vec<QueueEntry> {
        let mut claimed: HashSet<Uuid> = persisted.iter().filter_map(|e| e.appointment_id).collect();
        let mut seen: HashSet<Uuid> = HashSet::new();

        let virtual_entries = due
            .iter()
            .filter(|a| a.status.is_due())
            .filter(|a| claimed.insert(a.id))
            .map(|a| QueueEntry::Virtual(VirtualQueueEntry::from_appointment(a)));

        let mut queue: Vec<QueueEntry> = persisted
            .iter()
            .filter(|e| e.status == QueueStatus::Waiting)
            .filter(|e| seen.insert(e.id))
            .cloned()
            .map(QueueEntry::Persisted)
            .chain(virtual_entries)
            .collect();

        queue.sort_by(|a, b| {
            b.checked_in_at()
                .cmp(&a.checked_in_at())
                .then_with(|| a.sort_key().cmp(&b.sort_key()))
        });

        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use scheduling_cell::{hhmm, AppointmentStatus};

    use crate::models::Priority;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn at(time: &str) -> NaiveDateTime {
        today().and_time(hhmm::parse(time).unwrap())
    }

    fn appointment(time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            clinician_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            date: today(),
            time: hhmm::parse(time).unwrap(),
            status,
            reason: None,
        }
    }

    fn entry(appointment_id: Option<Uuid>, status: QueueStatus, checked_in: &str) -> PersistedQueueEntry {
        PersistedQueueEntry {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_id,
            clinician_id: Uuid::nil(),
            status,
            checked_in_at: at(checked_in),
            priority: Priority::Normal,
        }
    }

    #[test]
    fn test_unchecked_appointment_becomes_virtual_entry() {
        let appointment = appointment("14:00", AppointmentStatus::Confirmed);
        let queue = QueueProjector::project(&[], &[appointment.clone()]);

        assert_eq!(queue.len(), 1);
        assert!(queue[0].is_from_appointment());
        assert_eq!(queue[0].appointment_id(), Some(appointment.id));
        assert_eq!(queue[0].checked_in_at(), at("14:00"));
        assert_eq!(queue[0].status(), QueueStatus::Waiting);
    }

    #[test]
    fn test_checked_in_appointment_is_not_duplicated() {
        let appointment = appointment("09:00", AppointmentStatus::Scheduled);
        let persisted = vec![entry(Some(appointment.id), QueueStatus::Waiting, "08:55")];

        let queue = QueueProjector::project(&persisted, &[appointment.clone(), appointment]);

        assert_eq!(queue.len(), 1);
        assert!(!queue[0].is_from_appointment());
    }

    #[test]
    fn test_consulted_appointment_leaves_the_queue() {
        let appointment = appointment("09:00", AppointmentStatus::Confirmed);
        let persisted = vec![
            entry(Some(appointment.id), QueueStatus::InConsultation, "09:01"),
            entry(None, QueueStatus::Completed, "08:00"),
        ];

        assert!(QueueProjector::project(&persisted, &[appointment]).is_empty());
    }

    #[test]
    fn test_only_due_appointments_are_projected() {
        let due = vec![
            appointment("10:00", AppointmentStatus::Cancelled),
            appointment("10:30", AppointmentStatus::Completed),
            appointment("11:00", AppointmentStatus::Scheduled),
        ];

        let queue = QueueProjector::project(&[], &due);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].appointment_id(), Some(due[2].id));
    }

    #[test]
    fn test_queue_is_newest_first() {
        let walk_in = entry(None, QueueStatus::Waiting, "10:15");
        let early = appointment("09:00", AppointmentStatus::Confirmed);
        let late = appointment("11:30", AppointmentStatus::Scheduled);

        let queue = QueueProjector::project(&[walk_in.clone()], &[early.clone(), late.clone()]);
        let order: Vec<NaiveDateTime> = queue.iter().map(QueueEntry::checked_in_at).collect();

        assert_eq!(order, vec![at("11:30"), at("10:15"), at("09:00")]);
        assert_eq!(queue[1].entry_ref(), crate::models::EntryRef::Persisted(walk_in.id));
    }

    #[test]
    fn test_projection_is_stable_and_unique() {
        let due: Vec<Appointment> = ["09:00", "09:00", "09:30", "10:00"]
            .iter()
            .map(|t| appointment(t, AppointmentStatus::Scheduled))
            .collect();
        let persisted = vec![
            entry(Some(due[3].id), QueueStatus::Waiting, "09:45"),
            entry(None, QueueStatus::Waiting, "09:00"),
        ];

        let first = QueueProjector::project(&persisted, &due);
        let second = QueueProjector::project(&persisted, &due);
        assert_eq!(first, second);

        let ids: Vec<Uuid> = first.iter().filter_map(QueueEntry::appointment_id).collect();
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_entry_from_previous_day_stays_and_claims_its_appointment() {
        let appointment = appointment("09:00", AppointmentStatus::Confirmed);
        let before_midnight = today().pred_opt().unwrap().and_time(hhmm::parse("23:50").unwrap());
        let carried_over = PersistedQueueEntry {
            checked_in_at: before_midnight,
            ..entry(Some(appointment.id), QueueStatus::Waiting, "00:00")
        };

        let queue = QueueProjector::project(&[carried_over.clone()], &[appointment]);

        assert_eq!(queue, vec![QueueEntry::Persisted(carried_over)]);
    }

    #[test]
    fn test_row_listed_twice_is_projected_once() {
        let appointment = appointment("09:00", AppointmentStatus::Scheduled);
        let waiting = entry(Some(appointment.id), QueueStatus::Waiting, "08:55");

        let queue = QueueProjector::project(&[waiting.clone(), waiting.clone()], &[appointment]);

        assert_eq!(queue, vec![QueueEntry::Persisted(waiting)]);
    }
}
