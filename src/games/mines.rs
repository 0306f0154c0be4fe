//! Mines: 25 tiles, a chosen number of mines, reveal until you cash out or
//! hit one.

use serde::{Deserialize, Serialize};

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::{compounding_multiplier, HousePolicy, Multiplier};
use crate::games::reveal::{place_hazards, RevealResult, RevealStatus};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const MINES_TILES: u32 = 25;

pub fn validate(mines: u32) -> CasinoResult<()> {
    if mines == 0 || mines >= MINES_TILES {
        return Err(CasinoError::invalid(format!(
            "mine count must be within [1, {}], got {}",
            MINES_TILES - 1,
            mines
        )));
    }
    Ok(())
}

/// Multiplier after `safe_reveals` successful picks with `mines` on the board.
pub fn multiplier_after(safe_reveals: u32, mines: u32, policy: &HousePolicy) -> Multiplier {
    compounding_multiplier(
        (0..safe_reveals).map(|i| (MINES_TILES - i, MINES_TILES - mines - i)),
        policy.rtp_bps,
    )
}

/// Public view of a round in progress (no mine positions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinesView {
    pub mines: u32,
    pub revealed: Vec<u32>,
    pub multiplier: Multiplier,
    pub next_multiplier: Multiplier,
}

#[derive(Debug, Clone)]
pub struct MinesRound {
    bet_amount: u64,
    mines: u32,
    layout: Vec<bool>,
    revealed: Vec<u32>,
    status: RevealStatus,
    policy: HousePolicy,
}

impl MinesRound {
    /// Place the mines. `mines` must have passed [`validate`].
    pub fn start(
        bet_amount: u64,
        mines: u32,
        policy: HousePolicy,
        source: &mut dyn RandomSource,
    ) -> Self {
        Self {
            bet_amount,
            mines,
            layout: place_hazards(MINES_TILES, mines, source),
            revealed: Vec::new(),
            status: RevealStatus::Active,
            policy,
        }
    }

    pub fn status(&self) -> RevealStatus {
        self.status
    }

    pub fn safe_reveals(&self) -> u32 {
        self.revealed.len() as u32
    }

    pub fn multiplier(&self) -> Multiplier {
        multiplier_after(self.safe_reveals(), self.mines, &self.policy)
    }

    pub fn view(&self) -> MinesView {
        let next = (self.safe_reveals() + self.mines < MINES_TILES)
            .then(|| multiplier_after(self.safe_reveals() + 1, self.mines, &self.policy))
            .unwrap_or_else(|| self.multiplier());
        MinesView {
            mines: self.mines,
            revealed: self.revealed.clone(),
            multiplier: self.multiplier(),
            next_multiplier: next,
        }
    }

    pub fn reveal(&mut self, tile: u32) -> CasinoResult<RevealResult> {
        self.status.ensure_active()?;
        if tile >= MINES_TILES {
            return Err(CasinoError::invalid(format!("tile {} is off the board", tile)));
        }
        if self.revealed.contains(&tile) {
            return Err(CasinoError::conflict(format!("tile {} already revealed", tile)));
        }

        if self.layout[tile as usize] {
            self.status = RevealStatus::HitHazard;
            self.revealed.push(tile);
            return Ok(RevealResult::Finished(self.outcome(Multiplier::ZERO)));
        }

        self.revealed.push(tile);
        let multiplier = self.multiplier();
        if self.safe_reveals() == MINES_TILES - self.mines {
            self.status = RevealStatus::Cleared;
            return Ok(RevealResult::Finished(self.outcome(multiplier)));
        }
        Ok(RevealResult::Safe { multiplier })
    }

    pub fn cash_out(&mut self) -> CasinoResult<ResolutionOutcome> {
        self.status.ensure_active()?;
        if self.revealed.is_empty() {
            return Err(CasinoError::conflict("cash out needs at least one revealed tile"));
        }
        self.status = RevealStatus::CashedOut;
        Ok(self.outcome(self.multiplier()))
    }

    /// Abandon the round; the stake is lost.
    pub fn forfeit(&mut self) -> CasinoResult<ResolutionOutcome> {
        self.status.ensure_active()?;
        self.status = RevealStatus::Forfeited;
        Ok(self.outcome(Multiplier::ZERO))
    }

    fn outcome(&self, multiplier: Multiplier) -> ResolutionOutcome {
        ResolutionOutcome::settle(
            GameType::Mines,
            self.bet_amount,
            multiplier,
            OutcomeDetail::Mines {
                mines: self.mines,
                layout: self.layout.clone(),
                revealed: self.revealed.clone(),
            },
        )
    }
}
