use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::{FairnessEngine, RandomSource};
use crate::games::loot::{CaseCatalog, CaseDefinition};
use crate::games::policy::HousePolicy;
use crate::games::rounds::RoundGame;
use crate::games::types::{GameParameters, GameType, ResolutionOutcome, RoundParameters};
use crate::games::{battle, cases, coinflip, crash, dice, mines, roulette, tower, upgrade};

/// Minimum stakes, with optional per-game overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetLimits {
    pub min_bet: u64,
    #[serde(default)]
    pub per_game: HashMap<GameType, u64>,
}

impl BetLimits {
    pub fn min_for(&self, game: GameType) -> u64 {
        self.per_game.get(&game).copied().unwrap_or(self.min_bet)
    }
}

/// Validates wagers and dispatches them to the resolvers
pub struct GameProcessor {
    policy: HousePolicy,
    limits: BetLimits,
    catalog: Arc<CaseCatalog>,
}

impl GameProcessor {
    pub fn new(policy: HousePolicy, limits: BetLimits, catalog: Arc<CaseCatalog>) -> Self {
        Self {
            policy,
            limits,
            catalog,
        }
    }

    pub fn policy(&self) -> &HousePolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &CaseCatalog {
        &self.catalog
    }

    /// Check stake and parameters against `balance`. Nothing is drawn.
    pub fn validate(
        &self,
        bet_amount: u64,
        params: &GameParameters,
        balance: u64,
    ) -> CasinoResult<()> {
        self.validate_stake(params.game_type(), bet_amount, balance)?;

        match params {
            GameParameters::CoinFlip { .. } => Ok(()),
            GameParameters::Dice { chance_bps } => dice::validate(*chance_bps),
            GameParameters::Roulette { bets } => {
                let total = roulette::validate(bets)?;
                expect_stake("roulette bets", total, bet_amount)
            }
            GameParameters::Crash { target_hundredths } => {
                crash::validate_target(*target_hundredths)
            }
            GameParameters::Case { case_id, count } => {
                let case = self.catalog.get(case_id)?;
                let stake = cases::validate(case, *count)?;
                expect_stake("case price", stake, bet_amount)
            }
            GameParameters::Battle {
                case_ids,
                mode,
                players,
            } => {
                let picked = self.battle_cases(case_ids)?;
                let entry = battle::validate(*mode, *players, &picked)?;
                expect_stake("battle entry", entry, bet_amount)
            }
            GameParameters::Upgrade { chance_percent } => upgrade::validate(*chance_percent),
        }
    }

    pub fn validate_round(
        &self,
        bet_amount: u64,
        params: &RoundParameters,
        balance: u64,
    ) -> CasinoResult<()> {
        self.validate_stake(params.game_type(), bet_amount, balance)?;
        match params {
            RoundParameters::Mines { mines } => mines::validate(*mines),
            RoundParameters::Tower { .. } | RoundParameters::Crash => Ok(()),
        }
    }

    /// Resolve a validated single-request wager and attach its draws.
    pub fn resolve(
        &self,
        bet_amount: u64,
        params: &GameParameters,
        engine: &mut FairnessEngine,
    ) -> CasinoResult<ResolutionOutcome> {
        let outcome = self.dispatch(bet_amount, params, engine)?;
        Ok(outcome.with_draws(engine.consumed().to_vec()))
    }

    fn dispatch(
        &self,
        bet_amount: u64,
        params: &GameParameters,
        source: &mut dyn RandomSource,
    ) -> CasinoResult<ResolutionOutcome> {
        let outcome = match params {
            GameParameters::CoinFlip { choice } => coinflip::resolve(bet_amount, *choice, source),
            GameParameters::Dice { chance_bps } => {
                dice::resolve(bet_amount, *chance_bps, &self.policy, source)
            }
            GameParameters::Roulette { bets } => roulette::resolve(bets, source),
            GameParameters::Crash { target_hundredths } => {
                crash::resolve_auto(bet_amount, *target_hundredths, &self.policy, source)
            }
            GameParameters::Case { case_id, count } => {
                let case = self.catalog.get(case_id)?;
                cases::open(case, *count, source)
            }
            GameParameters::Battle {
                case_ids,
                mode,
                players,
            } => {
                let picked = self.battle_cases(case_ids)?;
                battle::resolve(*mode, *players, &picked, &self.policy, source)
            }
            GameParameters::Upgrade { chance_percent } => upgrade::resolve(
                bet_amount,
                *chance_percent,
                &self.policy,
                self.catalog.upgrade_rewards(),
                source,
            ),
        };
        Ok(outcome)
    }

    /// Lay out a validated interactive round.
    pub fn start_round(
        &self,
        bet_amount: u64,
        params: &RoundParameters,
        source: &mut dyn RandomSource,
    ) -> RoundGame {
        match params {
            RoundParameters::Mines { mines } => {
                RoundGame::Mines(mines::MinesRound::start(bet_amount, *mines, self.policy, source))
            }
            RoundParameters::Tower { difficulty } => {
                RoundGame::Tower(tower::TowerRound::start(
                    bet_amount,
                    *difficulty,
                    self.policy,
                    source,
                ))
            }
            RoundParameters::Crash => {
                RoundGame::Crash(crash::CrashRound::start(&self.policy, source))
            }
        }
    }

    fn validate_stake(&self, game: GameType, bet_amount: u64, balance: u64) -> CasinoResult<()> {
        let min = self.limits.min_for(game).max(1);
        if bet_amount < min {
            return Err(CasinoError::invalid(format!(
                "bet {} is below the {} minimum of {}",
                bet_amount, game, min
            )));
        }
        if bet_amount > balance {
            return Err(CasinoError::invalid(format!(
                "bet {} exceeds balance {}",
                bet_amount, balance
            )));
        }
        Ok(())
    }

    fn battle_cases(&self, case_ids: &[String]) -> CasinoResult<Vec<&CaseDefinition>> {
        case_ids.iter().map(|id| self.catalog.get(id)).collect()
    }
}

fn expect_stake(what: &str, required: u64, bet_amount: u64) -> CasinoResult<()> {
    if required != bet_amount {
        return Err(CasinoError::invalid(format!(
            "{} total {} does not match bet {}",
            what, required, bet_amount
        )));
    }
    Ok(())
}
