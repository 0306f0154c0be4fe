use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::FairnessEngine;
use crate::games::crash::{multiplier_at, CrashRound};
use crate::games::mines::{MinesRound, MinesView};
use crate::games::reveal::RevealResult;
use crate::games::tower::{TowerRound, TowerView};
use crate::games::types::{GameType, ResolutionOutcome};

/// Game state of an interactive round
pub enum RoundGame {
    Mines(MinesRound),
    Tower(TowerRound),
    Crash(CrashRound),
}

/// Player action against an open round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAction {
    Reveal(u32),
    CashOut,
    Forfeit,
}

/// What the player may see of an unfinished round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum RoundStateView {
    Mines(MinesView),
    Tower(TowerView),
    Crash { elapsed_ms: u64, multiplier_hundredths: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub round_id: String,
    pub wager_id: String,
    pub player_id: String,
    pub game_type: GameType,
    pub bet_amount: u64,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub started_at: DateTime<Utc>,
    pub state: RoundStateView,
}

pub enum RoundProgress {
    Continue(RoundView),
    Finished(ResolutionOutcome),
}

/// An open round together with the fairness engine that laid it out. The
/// engine stays sealed until the round resolves.
pub struct ActiveRound {
    pub round_id: String,
    pub wager_id: String,
    pub player_id: String,
    pub bet_amount: u64,
    pub game: RoundGame,
    pub engine: FairnessEngine,
    pub started_at: DateTime<Utc>,
    started: Instant,
    last_action: Instant,
}

impl ActiveRound {
    pub fn new(
        round_id: String,
        wager_id: String,
        player_id: String,
        bet_amount: u64,
        game: RoundGame,
        engine: FairnessEngine,
    ) -> Self {
        let now = Instant::now();
        Self {
            round_id,
            wager_id,
            player_id,
            bet_amount,
            game,
            engine,
            started_at: Utc::now(),
            started: now,
            last_action: now,
        }
    }

    pub fn game_type(&self) -> GameType {
        match self.game {
            RoundGame::Mines(_) => GameType::Mines,
            RoundGame::Tower(_) => GameType::Tower,
            RoundGame::Crash(_) => GameType::Crash,
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_action.elapsed()
    }

    pub fn view(&self) -> RoundView {
        let state = match &self.game {
            RoundGame::Mines(round) => RoundStateView::Mines(round.view()),
            RoundGame::Tower(round) => RoundStateView::Tower(round.view()),
            RoundGame::Crash(_) => {
                let elapsed = self.started.elapsed();
                RoundStateView::Crash {
                    elapsed_ms: elapsed.as_millis() as u64,
                    multiplier_hundredths: multiplier_at(elapsed),
                }
            }
        };
        RoundView {
            round_id: self.round_id.clone(),
            wager_id: self.wager_id.clone(),
            player_id: self.player_id.clone(),
            game_type: self.game_type(),
            bet_amount: self.bet_amount,
            server_seed_hash: self.engine.server_seed_hash().to_string(),
            client_seed: self.engine.client_seed().to_string(),
            nonce: self.engine.nonce(),
            started_at: self.started_at,
            state,
        }
    }

    /// Apply a player action. Finished outcomes carry the draws that laid
    /// out the round.
    pub fn apply(&mut self, action: RoundAction) -> CasinoResult<RoundProgress> {
        self.last_action = Instant::now();
        let finished = match (&mut self.game, action) {
            (RoundGame::Mines(round), RoundAction::Reveal(tile)) => match round.reveal(tile)? {
                RevealResult::Safe { .. } => None,
                RevealResult::Finished(outcome) => Some(outcome),
            },
            (RoundGame::Tower(round), RoundAction::Reveal(column)) => match round.reveal(column)? {
                RevealResult::Safe { .. } => None,
                RevealResult::Finished(outcome) => Some(outcome),
            },
            (RoundGame::Crash(_), RoundAction::Reveal(_)) => {
                return Err(CasinoError::invalid("crash rounds have nothing to reveal"));
            }
            (RoundGame::Mines(round), RoundAction::CashOut) => Some(round.cash_out()?),
            (RoundGame::Tower(round), RoundAction::CashOut) => Some(round.cash_out()?),
            (RoundGame::Crash(round), RoundAction::CashOut) => {
                Some(round.cash_out(self.bet_amount, self.started.elapsed()))
            }
            (RoundGame::Mines(round), RoundAction::Forfeit) => Some(round.forfeit()?),
            (RoundGame::Tower(round), RoundAction::Forfeit) => Some(round.forfeit()?),
            (RoundGame::Crash(round), RoundAction::Forfeit) => Some(round.forfeit(self.bet_amount)),
        };

        Ok(match finished {
            Some(outcome) => {
                let draws = self.engine.consumed().to_vec();
                RoundProgress::Finished(outcome.with_draws(draws))
            }
            None => RoundProgress::Continue(self.view()),
        })
    }
}

/// Open rounds keyed by round id, at most one per player.
///
/// A round is taken out while an action runs and put back if it continues,
/// so no map guard is held across persistence calls.
#[derive(Default)]
pub struct RoundRegistry {
    rounds: DashMap<String, ActiveRound>,
    by_player: DashMap<String, String>,
}

impl RoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round id currently open for `player_id`.
    pub fn active_for(&self, player_id: &str) -> Option<String> {
        self.by_player.get(player_id).map(|id| id.value().clone())
    }

    /// Fails with a conflict if the player already has an open round.
    pub fn ensure_free(&self, player_id: &str) -> CasinoResult<()> {
        match self.active_for(player_id) {
            Some(round_id) => Err(CasinoError::conflict(format!(
                "player {} already has open round {}",
                player_id, round_id
            ))),
            None => Ok(()),
        }
    }

    pub fn insert(&self, round: ActiveRound) -> CasinoResult<()> {
        self.ensure_free(&round.player_id)?;
        self.by_player
            .insert(round.player_id.clone(), round.round_id.clone());
        self.rounds.insert(round.round_id.clone(), round);
        Ok(())
    }

    /// Take the round out for an action by `player_id`.
    pub fn take(&self, round_id: &str, player_id: &str) -> CasinoResult<ActiveRound> {
        match self.rounds.get(round_id) {
            Some(round) if round.player_id != player_id => {
                return Err(CasinoError::conflict(format!(
                    "round {} does not belong to player {}",
                    round_id, player_id
                )));
            }
            Some(_) => {}
            None => {
                return Err(CasinoError::conflict(format!(
                    "round {} is not open",
                    round_id
                )));
            }
        }
        self.rounds
            .remove(round_id)
            .map(|(_, round)| round)
            .ok_or_else(|| CasinoError::conflict(format!("round {} is not open", round_id)))
    }

    /// Put a continuing round back.
    pub fn restore(&self, round: ActiveRound) {
        self.rounds.insert(round.round_id.clone(), round);
    }

    /// Release the player's slot once the round has resolved.
    pub fn finish(&self, round_id: &str, player_id: &str) {
        self.by_player
            .remove_if(player_id, |_, open| open.as_str() == round_id);
    }

    pub fn view(&self, round_id: &str) -> Option<RoundView> {
        self.rounds.get(round_id).map(|round| round.view())
    }

    /// `(round_id, player_id)` of rounds idle longer than `timeout`.
    pub fn expired(&self, timeout: Duration) -> Vec<(String, String)> {
        self.rounds
            .iter()
            .filter(|entry| entry.idle_for() > timeout)
            .map(|entry| (entry.round_id.clone(), entry.player_id.clone()))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.by_player.len()
    }
}
