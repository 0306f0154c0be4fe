//! Tower: climb eight levels, picking one tile per level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::{compounding_multiplier, HousePolicy, Multiplier};
use crate::games::reveal::{place_hazards, RevealResult, RevealStatus};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const TOWER_LEVELS: u32 = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TowerDifficulty {
    Easy,
    Medium,
    Hard,
    Expert,
    Master,
}

impl TowerDifficulty {
    /// `(tiles per level, safe tiles per level)`
    pub fn shape(&self) -> (u32, u32) {
        match self {
            TowerDifficulty::Easy => (4, 3),
            TowerDifficulty::Medium => (3, 2),
            TowerDifficulty::Hard => (2, 1),
            TowerDifficulty::Expert => (3, 1),
            TowerDifficulty::Master => (4, 1),
        }
    }

    pub fn tiles(&self) -> u32 {
        self.shape().0
    }

    pub fn traps(&self) -> u32 {
        let (tiles, safe) = self.shape();
        tiles - safe
    }
}

impl fmt::Display for TowerDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TowerDifficulty::Easy => write!(f, "easy"),
            TowerDifficulty::Medium => write!(f, "medium"),
            TowerDifficulty::Hard => write!(f, "hard"),
            TowerDifficulty::Expert => write!(f, "expert"),
            TowerDifficulty::Master => write!(f, "master"),
        }
    }
}

pub fn multiplier_after(
    levels_cleared: u32,
    difficulty: TowerDifficulty,
    policy: &HousePolicy,
) -> Multiplier {
    let shape = difficulty.shape();
    compounding_multiplier((0..levels_cleared).map(|_| shape), policy.rtp_bps)
}

/// Public view of a climb in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowerView {
    pub difficulty: TowerDifficulty,
    pub level: u32,
    pub picks: Vec<u32>,
    pub multiplier: Multiplier,
    pub next_multiplier: Multiplier,
}

#[derive(Debug, Clone)]
pub struct TowerRound {
    bet_amount: u64,
    difficulty: TowerDifficulty,
    layout: Vec<Vec<bool>>,
    picks: Vec<u32>,
    status: RevealStatus,
    policy: HousePolicy,
}

impl TowerRound {
    /// Lay out every level up front, bottom level first.
    pub fn start(
        bet_amount: u64,
        difficulty: TowerDifficulty,
        policy: HousePolicy,
        source: &mut dyn RandomSource,
    ) -> Self {
        let layout = (0..TOWER_LEVELS)
            .map(|_| place_hazards(difficulty.tiles(), difficulty.traps(), source))
            .collect();
        Self {
            bet_amount,
            difficulty,
            layout,
            picks: Vec::new(),
            status: RevealStatus::Active,
            policy,
        }
    }

    pub fn status(&self) -> RevealStatus {
        self.status
    }

    pub fn level(&self) -> u32 {
        self.picks.len() as u32
    }

    pub fn multiplier(&self) -> Multiplier {
        multiplier_after(self.level(), self.difficulty, &self.policy)
    }

    pub fn view(&self) -> TowerView {
        let next_level = (self.level() + 1).min(TOWER_LEVELS);
        TowerView {
            difficulty: self.difficulty,
            level: self.level(),
            picks: self.picks.clone(),
            multiplier: self.multiplier(),
            next_multiplier: multiplier_after(next_level, self.difficulty, &self.policy),
        }
    }

    /// Pick `column` on the current level.
    pub fn reveal(&mut self, column: u32) -> CasinoResult<RevealResult> {
        self.status.ensure_active()?;
        if column >= self.difficulty.tiles() {
            return Err(CasinoError::invalid(format!(
                "column {} out of range for {} tower",
                column, self.difficulty
            )));
        }

        let level = self.level() as usize;
        self.picks.push(column);
        if self.layout[level][column as usize] {
            self.status = RevealStatus::HitHazard;
            return Ok(RevealResult::Finished(self.outcome(Multiplier::ZERO)));
        }

        let multiplier = self.multiplier();
        if self.level() == TOWER_LEVELS {
            self.status = RevealStatus::Cleared;
            return Ok(RevealResult::Finished(self.outcome(multiplier)));
        }
        Ok(RevealResult::Safe { multiplier })
    }

    pub fn cash_out(&mut self) -> CasinoResult<ResolutionOutcome> {
        self.status.ensure_active()?;
        if self.picks.is_empty() {
            return Err(CasinoError::conflict("cash out needs at least one cleared level"));
        }
        self.status = RevealStatus::CashedOut;
        Ok(self.outcome(self.multiplier()))
    }

    pub fn forfeit(&mut self) -> CasinoResult<ResolutionOutcome> {
        self.status.ensure_active()?;
        self.status = RevealStatus::Forfeited;
        Ok(self.outcome(Multiplier::ZERO))
    }

    fn outcome(&self, multiplier: Multiplier) -> ResolutionOutcome {
        ResolutionOutcome::settle(
            GameType::Tower,
            self.bet_amount,
            multiplier,
            OutcomeDetail::Tower {
                difficulty: self.difficulty,
                layout: self.layout.clone(),
                picks: self.picks.clone(),
            },
        )
    }
}
