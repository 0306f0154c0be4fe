//! Route Definitions

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Provable fairness
        .route("/api/fairness/commit", post(commit_handler))
        .route("/api/fairness/verify", post(verify_handler))
        // Single-request games
        .route("/api/play", post(play_handler))
        // Interactive rounds
        .route("/api/rounds/start", post(start_round_handler))
        .route("/api/rounds/:id/reveal", post(reveal_handler))
        .route("/api/rounds/:id/cashout", post(cashout_handler))
        .route("/api/rounds/:id/forfeit", post(forfeit_handler))
        // Players
        .route("/api/players/:id", get(player_handler))
        .route("/api/players/:id/history", get(history_handler))
        .route("/api/cases", get(cases_handler))
        .with_state(state)
}
