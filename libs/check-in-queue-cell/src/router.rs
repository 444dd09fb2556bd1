use std::sync::Arc;
use axum::{
    Router,
    routing::{get, post},
};

use shared_config::AppConfig;
use crate::handlers::{
    get_queue,
    list_entries,
    get_entry,
    check_in,
    apply_transition,
};

pub fn queue_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(get_queue))
        .route("/entries", get(list_entries))
        .route("/entries/{entry_id}", get(get_entry))
        .route("/check-in", post(check_in))
        .route("/transitions", post(apply_transition))
        .with_state(state)
}
