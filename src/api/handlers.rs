//! Request Handlers

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
};
use crate::errors::CasinoError;
use crate::fairness::verify_draws;
use crate::games::rounds::RoundAction;
use crate::service::CasinoService;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub service: Arc<CasinoService>,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let metrics = state.service.metrics();
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        uptime_seconds: metrics.uptime().as_secs(),
        active_rounds: metrics.active_rounds.load(Ordering::Relaxed),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics().to_prometheus_format(),
    )
}

/// POST /api/fairness/commit
pub async fn commit_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommitRequest>,
) -> Json<CommitResponse> {
    let server_seed_hash = state.service.commit_seed(&req.player_id);
    Json(CommitResponse {
        player_id: req.player_id,
        server_seed_hash,
    })
}

/// POST /api/fairness/verify
pub async fn verify_handler(Json(req): Json<VerifyRequest>) -> Json<VerifyResponse> {
    Json(verify_draws(&req.reveal, &req.draws).into())
}

/// A wager body that does not decode is an invalid wager.
fn decode_wager<T: DeserializeOwned>(request_id: &RequestId, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::from_casino(request_id.0.clone(), CasinoError::from(e)))
}

/// POST /api/play
pub async fn play_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<WagerResponse>, ApiError> {
    let req: PlayRequest = decode_wager(&request_id, &body)?;
    let receipt = state
        .service
        .play(req.into())
        .await
        .map_err(|e| ApiError::from_casino(request_id.0, e))?;
    Ok(Json(receipt.into()))
}

/// POST /api/rounds/start
pub async fn start_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RoundResponse>, ApiError> {
    let req: StartRoundRequest = decode_wager(&request_id, &body)?;
    let round = state
        .service
        .start_round(req.into())
        .await
        .map_err(|e| ApiError::from_casino(request_id.0, e))?;
    Ok(Json(RoundResponse::Active { round }))
}

async fn round_action(
    request_id: RequestId,
    state: &AppState,
    round_id: &str,
    player_id: &str,
    action: RoundAction,
) -> Result<Json<RoundResponse>, ApiError> {
    let reply = state
        .service
        .round_action(round_id, player_id, action)
        .await
        .map_err(|e| ApiError::from_casino(request_id.0, e))?;
    Ok(Json(reply.into()))
}

/// POST /api/rounds/:id/reveal
pub async fn reveal_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<RoundResponse>, ApiError> {
    round_action(
        request_id,
        &state,
        &round_id,
        &req.player_id,
        RoundAction::Reveal(req.index),
    )
    .await
}

/// POST /api/rounds/:id/cashout
pub async fn cashout_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
    Json(req): Json<RoundActionRequest>,
) -> Result<Json<RoundResponse>, ApiError> {
    round_action(request_id, &state, &round_id, &req.player_id, RoundAction::CashOut).await
}

/// POST /api/rounds/:id/forfeit
pub async fn forfeit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
    Json(req): Json<RoundActionRequest>,
) -> Result<Json<RoundResponse>, ApiError> {
    round_action(request_id, &state, &round_id, &req.player_id, RoundAction::Forfeit).await
}

/// GET /api/players/:id
pub async fn player_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let summary = state
        .service
        .player(&player_id)
        .await
        .map_err(|e| ApiError::from_casino(request_id.0, e))?;
    Ok(Json(summary))
}

/// GET /api/players/:id/history?limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request(
            request_id.0,
            "'limit' must be positive".to_string(),
        ));
    }
    let records = state
        .service
        .history(&player_id, params.limit.min(MAX_HISTORY_LIMIT))
        .await
        .map_err(|e| ApiError::from_casino(request_id.0, e))?;
    Ok(Json(HistoryResponse { player_id, records }))
}

/// GET /api/cases
pub async fn cases_handler(State(state): State<Arc<AppState>>) -> Json<CasesResponse> {
    Json(CasesResponse {
        cases: state.service.catalog().cases().map(CaseSummary::from).collect(),
    })
}
