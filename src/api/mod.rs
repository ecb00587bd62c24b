use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/horizon", get(handlers::get_horizon))
        .route("/api/forecast", get(handlers::get_forecast))
        .route("/api/lots/{location_id}/trend", get(handlers::get_lot_trend))
        .with_state(state)
}
