use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use check_in_queue_cell::*;
use scheduling_cell::{hhmm, Appointment, AppointmentStatus, ClinicianScope, InMemoryAppointmentStore};

const IO_TIMEOUT: Duration = Duration::from_secs(1);

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn at(time: &str) -> NaiveDateTime {
    today().and_time(hhmm::parse(time).unwrap())
}

fn tomorrow() -> NaiveDate {
    today().succ_opt().unwrap()
}

fn yesterday_at(time: &str) -> NaiveDateTime {
    today().pred_opt().unwrap().and_time(hhmm::parse(time).unwrap())
}

struct QueueFixture {
    clinician_id: Uuid,
    patient_record: Uuid,
    appointment: Appointment,
    store: Arc<InMemoryQueueStore>,
    patients: Arc<InMemoryPatientResolver>,
    appointments: Arc<InMemoryAppointmentStore>,
    queue: CheckInQueue,
}

/// One confirmed 14:00 appointment whose patient user id resolves to a
/// patient record.
async fn queue_with_afternoon_appointment() -> QueueFixture {
    let clinician_id = Uuid::new_v4();
    let patient_user = Uuid::new_v4();
    let patient_record = Uuid::new_v4();

    let appointment = Appointment {
        id: Uuid::new_v4(),
        clinician_id,
        patient_id: patient_user,
        date: today(),
        time: hhmm::parse("14:00").unwrap(),
        status: AppointmentStatus::Confirmed,
        reason: Some("Blood pressure review".to_string()),
    };

    let appointments = Arc::new(InMemoryAppointmentStore::new());
    appointments.seed(appointment.clone()).await;

    let patients = Arc::new(InMemoryPatientResolver::new());
    patients.add_patient(patient_record, Some(patient_user)).await;

    let store = Arc::new(InMemoryQueueStore::new());
    let queue = CheckInQueue::new(store.clone(), patients.clone(), appointments.clone(), IO_TIMEOUT);

    QueueFixture {
        clinician_id,
        patient_record,
        appointment,
        store,
        patients,
        appointments,
        queue,
    }
}

#[tokio::test]
async fn test_virtual_entry_cannot_start_before_appointment() {
    let fixture = queue_with_afternoon_appointment().await;

    let projected = fixture
        .queue
        .project_queue(ClinicianScope::Clinician(fixture.clinician_id), today())
        .await
        .unwrap();

    assert_eq!(projected.len(), 1);
    assert!(projected[0].is_from_appointment());
    assert_eq!(projected[0].entry_ref(), EntryRef::Appointment(fixture.appointment.id));

    let result = fixture
        .queue
        .apply_transition(projected[0].entry_ref(), QueueStatus::InConsultation, at("13:55"))
        .await;

    assert_matches!(
        result,
        Err(QueueError::InvalidTransition {
            from: QueueStatus::Waiting,
            to: QueueStatus::InConsultation,
            ..
        })
    );
    assert!(fixture.store.all().await.is_empty(), "rejected action must not materialize");
}

#[tokio::test]
async fn test_virtual_entry_materializes_inside_window() {
    let fixture = queue_with_afternoon_appointment().await;

    let entry = fixture
        .queue
        .apply_transition(
            EntryRef::Appointment(fixture.appointment.id),
            QueueStatus::InConsultation,
            at("14:05"),
        )
        .await
        .unwrap();

    assert_eq!(entry.status, QueueStatus::InConsultation);
    assert_eq!(entry.appointment_id, Some(fixture.appointment.id));
    assert_eq!(entry.patient_id, fixture.patient_record);
    assert_eq!(entry.clinician_id, fixture.clinician_id);
    assert_eq!(entry.checked_in_at, at("14:05"));

    let stored = fixture.store.all().await;
    assert_eq!(stored, vec![entry.clone()]);

    let projected = fixture
        .queue
        .project_queue(ClinicianScope::Clinician(fixture.clinician_id), today())
        .await
        .unwrap();
    assert!(projected.is_empty(), "consulting patients leave the waiting queue");

    let completed = fixture
        .queue
        .apply_transition(EntryRef::Persisted(entry.id), QueueStatus::Completed, at("14:50"))
        .await
        .unwrap();
    assert_eq!(completed.status, QueueStatus::Completed);
}

#[tokio::test]
async fn test_missed_appointment_can_only_complete() {
    let fixture = queue_with_afternoon_appointment().await;
    let entry_ref = EntryRef::Appointment(fixture.appointment.id);

    assert_matches!(
        fixture.queue.apply_transition(entry_ref, QueueStatus::InConsultation, at("14:35")).await,
        Err(QueueError::InvalidTransition { .. })
    );

    let completed = fixture
        .queue
        .apply_transition(entry_ref, QueueStatus::Completed, at("14:35"))
        .await
        .unwrap();
    assert_eq!(completed.status, QueueStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_materialization_creates_one_entry() {
    let fixture = queue_with_afternoon_appointment().await;
    let machine = fixture.queue.state_machine();

    let (first, second) = futures::join!(
        machine.materialize(&fixture.appointment, Priority::Normal, at("14:01")),
        machine.materialize(&fixture.appointment, Priority::Normal, at("14:01")),
    );

    let outcomes = [first, second];
    let created: Vec<&PersistedQueueEntry> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(created.len(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(QueueError::DuplicateQueueEntry(id)) if *id == fixture.appointment.id
    )));
    assert_eq!(fixture.store.all().await.len(), 1);
}

#[tokio::test]
async fn test_parallel_operators_race_on_same_appointment() {
    let fixture = queue_with_afternoon_appointment().await;
    let queue = Arc::new(fixture.queue);
    let entry_ref = EntryRef::Appointment(fixture.appointment.id);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .apply_transition(entry_ref, QueueStatus::InConsultation, at("14:02"))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_matches!(e, QueueError::DuplicateQueueEntry(_)),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(fixture.store.all().await.len(), 1);
}

#[tokio::test]
async fn test_unresolved_patient_leaves_no_entry() {
    let fixture = queue_with_afternoon_appointment().await;

    let stranger = Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        time: hhmm::parse("15:00").unwrap(),
        ..fixture.appointment.clone()
    };
    fixture.appointments.seed(stranger.clone()).await;

    let result = fixture
        .queue
        .apply_transition(EntryRef::Appointment(stranger.id), QueueStatus::InConsultation, at("15:00"))
        .await;

    assert_matches!(result, Err(QueueError::PatientNotFound(id)) if id == stranger.patient_id);
    assert!(fixture.store.all().await.is_empty());

    fixture.patients.add_patient(Uuid::new_v4(), Some(stranger.patient_id)).await;
    let retried = fixture
        .queue
        .apply_transition(EntryRef::Appointment(stranger.id), QueueStatus::InConsultation, at("15:00"))
        .await;
    assert!(retried.is_ok());
}

#[tokio::test]
async fn test_completed_entry_is_terminal() {
    let fixture = queue_with_afternoon_appointment().await;
    let entry = fixture
        .queue
        .apply_transition(
            EntryRef::Appointment(fixture.appointment.id),
            QueueStatus::InConsultation,
            at("14:00"),
        )
        .await
        .unwrap();
    fixture
        .queue
        .apply_transition(EntryRef::Persisted(entry.id), QueueStatus::Completed, at("14:20"))
        .await
        .unwrap();

    for target in [QueueStatus::Waiting, QueueStatus::InConsultation, QueueStatus::Completed] {
        assert_matches!(
            fixture
                .queue
                .apply_transition(EntryRef::Persisted(entry.id), target, at("14:25"))
                .await,
            Err(QueueError::InvalidTransition { from: QueueStatus::Completed, .. })
        );
    }
}

#[tokio::test]
async fn test_materialized_appointment_cannot_be_addressed_as_virtual_again() {
    let fixture = queue_with_afternoon_appointment().await;
    let entry_ref = EntryRef::Appointment(fixture.appointment.id);

    fixture
        .queue
        .apply_transition(entry_ref, QueueStatus::InConsultation, at("14:10"))
        .await
        .unwrap();

    assert_matches!(
        fixture.queue.apply_transition(entry_ref, QueueStatus::Completed, at("14:45")).await,
        Err(QueueError::DuplicateQueueEntry(_))
    );
}

#[tokio::test]
async fn test_unknown_entry_and_appointment_are_not_found() {
    let fixture = queue_with_afternoon_appointment().await;
    let missing = Uuid::new_v4();

    assert_matches!(
        fixture.queue.apply_transition(EntryRef::Persisted(missing), QueueStatus::Completed, at("10:00")).await,
        Err(QueueError::EntryNotFound(id)) if id == missing
    );
    assert_matches!(
        fixture.queue.apply_transition(EntryRef::Appointment(missing), QueueStatus::Completed, at("10:00")).await,
        Err(QueueError::AppointmentNotFound(id)) if id == missing
    );
}

#[tokio::test]
async fn test_waiting_walk_in_survives_midnight() {
    let fixture = queue_with_afternoon_appointment().await;
    let request = CheckInRequest {
        appointment_id: None,
        patient_id: Some(fixture.patient_record),
        clinician_id: Some(fixture.clinician_id),
        priority: None,
    };

    let walk_in = fixture.queue.check_in(request, at("23:50")).await.unwrap();

    let projected = fixture
        .queue
        .project_queue(ClinicianScope::Clinician(fixture.clinician_id), tomorrow())
        .await
        .unwrap();

    assert_eq!(projected, vec![QueueEntry::Persisted(walk_in)]);
}

#[tokio::test]
async fn test_overnight_appointment_checked_in_before_midnight_stays_queued() {
    let fixture = queue_with_afternoon_appointment().await;
    let late = Appointment {
        id: Uuid::new_v4(),
        time: hhmm::parse("23:30").unwrap(),
        ..fixture.appointment.clone()
    };
    fixture.appointments.seed(late.clone()).await;

    let request = CheckInRequest {
        appointment_id: Some(late.id),
        patient_id: None,
        clinician_id: None,
        priority: None,
    };
    let entry = fixture.queue.check_in(request, at("23:20")).await.unwrap();

    let projected = fixture
        .queue
        .project_queue(ClinicianScope::Clinician(fixture.clinician_id), tomorrow())
        .await
        .unwrap();

    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].entry_ref(), EntryRef::Persisted(entry.id));
    assert_eq!(projected[0].appointment_id(), Some(late.id));
}

#[tokio::test]
async fn test_entries_from_previous_day_claim_todays_appointments() {
    let fixture = queue_with_afternoon_appointment().await;
    let morning = Appointment {
        id: Uuid::new_v4(),
        time: hhmm::parse("09:00").unwrap(),
        ..fixture.appointment.clone()
    };
    fixture.appointments.seed(morning.clone()).await;

    let waiting = PersistedQueueEntry::waiting(
        fixture.patient_record,
        Some(fixture.appointment.id),
        fixture.clinician_id,
        yesterday_at("23:50"),
        Priority::Normal,
    );
    let finished = PersistedQueueEntry {
        status: QueueStatus::Completed,
        ..PersistedQueueEntry::waiting(
            fixture.patient_record,
            Some(morning.id),
            fixture.clinician_id,
            yesterday_at("23:55"),
            Priority::Normal,
        )
    };
    fixture.store.insert_if_absent(&waiting).await.unwrap();
    fixture.store.insert_if_absent(&finished).await.unwrap();

    let projected = fixture
        .queue
        .project_queue(ClinicianScope::Clinician(fixture.clinician_id), today())
        .await
        .unwrap();

    assert_eq!(projected, vec![QueueEntry::Persisted(waiting)]);
}
