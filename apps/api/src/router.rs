use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use check_in_queue_cell::queue_routes;
use scheduling_cell::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .nest("/scheduling", scheduling_routes(state.clone()))
        .nest("/queue", queue_routes(state))
}
