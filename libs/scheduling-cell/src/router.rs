use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/clinicians/{clinician_id}/slots", get(handlers::get_available_slots))
        .route("/clinicians/{clinician_id}/windows", get(handlers::get_availability_windows))
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .with_state(state)
}
