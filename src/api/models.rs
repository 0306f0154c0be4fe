//! API Request and Response Models

use serde::{Deserialize, Serialize};

use crate::fairness::{Draw, FairnessReveal, Verification};
use crate::games::loot::{CaseDefinition, LootEntry};
use crate::games::rounds::RoundView;
use crate::games::types::{GameParameters, GameType, ResolutionOutcome, RoundParameters};
use crate::service::{PlayerSummary, RoundReply, WagerReceipt, WagerRequest, RoundStartRequest};
use crate::store::LedgerRecord;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_rounds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub player_id: String,
    pub server_seed_hash: String,
}

/// Draws to recompute against a disclosed seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub reveal: FairnessReveal,
    pub draws: Vec<Draw>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub commitment_matches: bool,
    pub draws_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_mismatch: Option<u64>,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        Self {
            valid: v.is_valid(),
            commitment_matches: v.commitment_matches,
            draws_match: v.draws_match,
            first_mismatch: v.first_mismatch,
        }
    }
}

/// POST /api/play
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub player_id: String,
    #[serde(default)]
    pub wager_id: Option<String>,
    pub bet_amount: u64,
    #[serde(default)]
    pub client_seed: Option<String>,
    pub game_parameters: GameParameters,
}

impl From<PlayRequest> for WagerRequest {
    fn from(req: PlayRequest) -> Self {
        Self {
            player_id: req.player_id,
            wager_id: req.wager_id,
            bet_amount: req.bet_amount,
            client_seed: req.client_seed,
            params: req.game_parameters,
        }
    }
}

/// POST /api/rounds/start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundRequest {
    pub player_id: String,
    #[serde(default)]
    pub wager_id: Option<String>,
    pub bet_amount: u64,
    #[serde(default)]
    pub client_seed: Option<String>,
    pub game_parameters: RoundParameters,
}

impl From<StartRoundRequest> for RoundStartRequest {
    fn from(req: StartRoundRequest) -> Self {
        Self {
            player_id: req.player_id,
            wager_id: req.wager_id,
            bet_amount: req.bet_amount,
            client_seed: req.client_seed,
            params: req.game_parameters,
        }
    }
}

/// Tile (mines) or column (tower) to uncover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRequest {
    pub player_id: String,
    pub index: u32,
}

/// Cash-out or forfeit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundActionRequest {
    pub player_id: String,
}

/// Settled wager as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerResponse {
    pub wager_id: String,
    pub player_id: String,
    pub game_type: GameType,
    pub won: bool,
    pub multiplier: f64,
    pub payout: u64,
    pub profit: i64,
    pub new_balance: u64,
    pub xp: u64,
    pub level: u32,
    pub outcome: ResolutionOutcome,
    pub fairness: FairnessReveal,
    pub next_server_seed_hash: String,
    pub replayed: bool,
}

impl From<WagerReceipt> for WagerResponse {
    fn from(receipt: WagerReceipt) -> Self {
        Self {
            wager_id: receipt.wager_id,
            player_id: receipt.player_id,
            game_type: receipt.outcome.game_type,
            won: receipt.outcome.won,
            multiplier: receipt.outcome.multiplier.as_f64(),
            payout: receipt.outcome.payout,
            profit: receipt.outcome.profit,
            new_balance: receipt.new_balance,
            xp: receipt.xp,
            level: receipt.level,
            outcome: receipt.outcome,
            fairness: receipt.fairness,
            next_server_seed_hash: receipt.next_server_seed_hash,
            replayed: receipt.replayed,
        }
    }
}

/// Round state after an action: still open, or settled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RoundResponse {
    Active { round: RoundView },
    Settled { receipt: Box<WagerResponse> },
}

impl From<RoundReply> for RoundResponse {
    fn from(reply: RoundReply) -> Self {
        match reply {
            RoundReply::Continue(round) => RoundResponse::Active { round },
            RoundReply::Settled(receipt) => RoundResponse::Settled {
                receipt: Box::new(receipt.into()),
            },
        }
    }
}

pub type PlayerResponse = PlayerSummary;

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub player_id: String,
    pub records: Vec<LedgerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub items: Vec<LootEntry>,
    /// Mean item value per case opened
    pub expected_value: f64,
}

impl From<&CaseDefinition> for CaseSummary {
    fn from(case: &CaseDefinition) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            price: case.price,
            items: case.table.entries().to_vec(),
            expected_value: case.table.expected_value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasesResponse {
    pub cases: Vec<CaseSummary>,
}
