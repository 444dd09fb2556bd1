use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::AppError;
use shared_utils::ClinicClock;

use crate::models::{Appointment, BookAppointmentRequest, RescheduleAppointmentRequest};
use crate::services::{AvailabilityCalendar, BookingLedger, SlotService};

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub day_of_week: Option<i32>,
    pub date: Option<NaiveDate>,
}

pub async fn get_available_slots(
    State(config): State<Arc<AppConfig>>,
    Path(clinician_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let today = ClinicClock::from_config(&config).today();
    let slot_service = SlotService::from_config(&config);

    let slots = slot_service
        .generate_slots(clinician_id, query.date, today)
        .await?;

    Ok(Json(json!({
        "clinician_id": clinician_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len()
    })))
}

pub async fn get_availability_windows(
    State(config): State<Arc<AppConfig>>,
    Path(clinician_id): Path<Uuid>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, AppError> {
    let day_of_week = match (query.day_of_week, query.date) {
        (Some(day), _) => day,
        (None, Some(date)) => AvailabilityCalendar::day_of_week(date),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either day_of_week or date is required".to_string(),
            ))
        }
    };

    if !(0..=6).contains(&day_of_week) {
        return Err(AppError::BadRequest(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    let slot_service = SlotService::from_config(&config);
    let windows = slot_service
        .calendar()
        .get_windows(clinician_id, day_of_week)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    Ok(Json(json!({
        "clinician_id": clinician_id,
        "day_of_week": day_of_week,
        "windows": windows
    })))
}

pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    info!("Booking request for clinician {} on {}", request.clinician_id, request.date);

    let today = ClinicClock::from_config(&config).today();
    let ledger = BookingLedger::from_config(&config);
    let appointment = ledger.book(request, today).await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn confirm_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let ledger = BookingLedger::from_config(&config);
    Ok(Json(ledger.confirm(appointment_id).await?))
}

pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    info!("Cancelling appointment {}", appointment_id);

    let ledger = BookingLedger::from_config(&config);
    Ok(Json(ledger.cancel(appointment_id).await?))
}

pub async fn reschedule_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    info!("Rescheduling appointment {} to {}", appointment_id, request.date);

    let today = ClinicClock::from_config(&config).today();
    let ledger = BookingLedger::from_config(&config);
    Ok(Json(ledger.reschedule(appointment_id, request, today).await?))
}
