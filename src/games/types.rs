use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fairness::Draw;
use crate::games::battle::{BattleMode, BattleSummary};
use crate::games::coinflip::CoinSide;
use crate::games::loot::LootDrop;
use crate::games::policy::Multiplier;
use crate::games::roulette::{PocketColor, RouletteBet, RouletteBetResult};
use crate::games::tower::TowerDifficulty;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    CoinFlip,
    Dice,
    Roulette,
    Crash,
    Mines,
    Tower,
    Case,
    Battle,
    Upgrade,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameType::CoinFlip => "coinflip",
            GameType::Dice => "dice",
            GameType::Roulette => "roulette",
            GameType::Crash => "crash",
            GameType::Mines => "mines",
            GameType::Tower => "tower",
            GameType::Case => "case",
            GameType::Battle => "battle",
            GameType::Upgrade => "upgrade",
        };
        write!(f, "{}", name)
    }
}

fn one() -> u32 {
    1
}

/// Parameters for games resolved in a single request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameParameters {
    CoinFlip {
        choice: CoinSide,
    },
    Dice {
        chance_bps: u32,
    },
    Roulette {
        bets: Vec<RouletteBet>,
    },
    /// Auto mode: cash-out target fixed before the draw
    Crash {
        target_hundredths: u64,
    },
    Case {
        case_id: String,
        #[serde(default = "one")]
        count: u32,
    },
    Battle {
        case_ids: Vec<String>,
        mode: BattleMode,
        players: u32,
    },
    Upgrade {
        chance_percent: u32,
    },
}

impl GameParameters {
    pub fn game_type(&self) -> GameType {
        match self {
            GameParameters::CoinFlip { .. } => GameType::CoinFlip,
            GameParameters::Dice { .. } => GameType::Dice,
            GameParameters::Roulette { .. } => GameType::Roulette,
            GameParameters::Crash { .. } => GameType::Crash,
            GameParameters::Case { .. } => GameType::Case,
            GameParameters::Battle { .. } => GameType::Battle,
            GameParameters::Upgrade { .. } => GameType::Upgrade,
        }
    }
}

/// Parameters for rounds that span several requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum RoundParameters {
    Mines { mines: u32 },
    Tower { difficulty: TowerDifficulty },
    /// Live crash: cash out while the multiplier climbs
    Crash,
}

impl RoundParameters {
    pub fn game_type(&self) -> GameType {
        match self {
            RoundParameters::Mines { .. } => GameType::Mines,
            RoundParameters::Tower { .. } => GameType::Tower,
            RoundParameters::Crash => GameType::Crash,
        }
    }
}

/// Game-specific description of what happened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutcomeDetail {
    CoinFlip {
        choice: CoinSide,
        landed: CoinSide,
    },
    Dice {
        roll: u64,
        chance_bps: u32,
    },
    Roulette {
        number: u8,
        color: PocketColor,
        bets: Vec<RouletteBetResult>,
    },
    Crash {
        crash_point_hundredths: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        cashout_hundredths: Option<u64>,
    },
    /// `layout[i]` is true where tile `i` holds a mine
    Mines {
        mines: u32,
        layout: Vec<bool>,
        revealed: Vec<u32>,
    },
    /// `layout[level][column]` is true where the tile is a trap
    Tower {
        difficulty: TowerDifficulty,
        layout: Vec<Vec<bool>>,
        picks: Vec<u32>,
    },
    Case {
        case_id: String,
        drops: Vec<LootDrop>,
    },
    Battle(BattleSummary),
    Upgrade {
        chance_percent: u32,
        roll: u64,
        target_value: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        granted: Option<LootDrop>,
    },
}

/// Immutable result of resolving one wager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionOutcome {
    pub game_type: GameType,
    pub bet_amount: u64,
    pub raw_draws: Vec<Draw>,
    pub detail: OutcomeDetail,
    pub won: bool,
    pub multiplier: Multiplier,
    pub payout: u64,
    pub profit: i64,
}

impl ResolutionOutcome {
    /// Outcome paying `floor(bet × multiplier)`.
    pub fn settle(
        game_type: GameType,
        bet_amount: u64,
        multiplier: Multiplier,
        detail: OutcomeDetail,
    ) -> Self {
        let payout = multiplier.apply(bet_amount);
        Self {
            game_type,
            bet_amount,
            raw_draws: Vec::new(),
            detail,
            won: !multiplier.is_zero(),
            multiplier,
            payout,
            profit: signed_profit(bet_amount, payout),
        }
    }

    /// Outcome for games whose payout is summed from parts (roulette slips,
    /// dropped items). The multiplier is `payout / bet`, so
    /// `floor(bet × multiplier) == payout` still holds.
    pub fn from_payout(
        game_type: GameType,
        bet_amount: u64,
        payout: u64,
        detail: OutcomeDetail,
    ) -> Self {
        let multiplier = Multiplier::ratio(payout as u128, bet_amount as u128);
        Self {
            game_type,
            bet_amount,
            raw_draws: Vec::new(),
            detail,
            won: !multiplier.is_zero(),
            multiplier,
            payout,
            profit: signed_profit(bet_amount, payout),
        }
    }

    pub fn with_draws(mut self, draws: Vec<Draw>) -> Self {
        self.raw_draws = draws;
        self
    }
}

fn signed_profit(bet_amount: u64, payout: u64) -> i64 {
    (payout as i128 - bet_amount as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
