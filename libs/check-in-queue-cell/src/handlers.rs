use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use scheduling_cell::ClinicianScope;
use shared_config::AppConfig;
use shared_models::AppError;
use shared_utils::ClinicClock;

use crate::{CheckInQueue, CheckInRequest, PersistedQueueEntry, QueueStatus, TransitionRequest};

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub clinician_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub clinician_id: Option<Uuid>,
    pub status: Option<QueueStatus>,
}

/// Merged queue for today
pub async fn get_queue(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let today = ClinicClock::from_config(&config).today();
    let queue = CheckInQueue::from_config(&config);

    let entries = queue
        .project_queue(ClinicianScope::from(query.clinician_id), today)
        .await?;

    Ok(Json(json!({
        "date": today,
        "entries": entries,
        "total": entries.len()
    })))
}

pub async fn list_entries(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Value>, AppError> {
    let queue = CheckInQueue::from_config(&config);

    let entries = queue
        .list_entries(ClinicianScope::from(query.clinician_id), query.status)
        .await?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

pub async fn get_entry(
    State(config): State<Arc<AppConfig>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<PersistedQueueEntry>, AppError> {
    let queue = CheckInQueue::from_config(&config);
    Ok(Json(queue.get_entry(entry_id).await?))
}

/// Explicit check-in at the front desk
pub async fn check_in(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<PersistedQueueEntry>), AppError> {
    info!(
        "Check-in request: appointment {:?}, patient {:?}",
        request.appointment_id, request.patient_id
    );

    let now = ClinicClock::from_config(&config).now();
    let queue = CheckInQueue::from_config(&config);
    let entry = queue.check_in(request, now).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Operator action on a queue entry, virtual or persisted
pub async fn apply_transition(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<PersistedQueueEntry>, AppError> {
    info!("Queue transition request: {:?} -> {}", request.entry, request.target_status);

    let now = ClinicClock::from_config(&config).now();
    let queue = CheckInQueue::from_config(&config);
    let entry = queue
        .apply_transition(request.entry, request.target_status, now)
        .await?;

    Ok(Json(entry))
}
