//! Roll-under dice: roll 0..=9999, win when the roll is below the chosen
//! chance (in basis points).

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::{HousePolicy, Multiplier, BPS};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const MIN_CHANCE_BPS: u32 = 100;
pub const MAX_CHANCE_BPS: u32 = 9_800;
const ROLL_MAX: u64 = 9_999;

pub fn validate(chance_bps: u32) -> CasinoResult<()> {
    if !(MIN_CHANCE_BPS..=MAX_CHANCE_BPS).contains(&chance_bps) {
        return Err(CasinoError::invalid(format!(
            "dice chance must be within [{}, {}] bps, got {}",
            MIN_CHANCE_BPS, MAX_CHANCE_BPS, chance_bps
        )));
    }
    Ok(())
}

/// Payout multiplier on a win: `rtp / chance`.
pub fn win_multiplier(chance_bps: u32, policy: &HousePolicy) -> Multiplier {
    Multiplier::ratio(BPS, chance_bps as u128).times(policy.rtp())
}

pub fn resolve(
    bet_amount: u64,
    chance_bps: u32,
    policy: &HousePolicy,
    source: &mut dyn RandomSource,
) -> ResolutionOutcome {
    let roll = source.next_int(0, ROLL_MAX);
    let multiplier = if roll < chance_bps as u64 {
        win_multiplier(chance_bps, policy)
    } else {
        Multiplier::ZERO
    };

    ResolutionOutcome::settle(
        GameType::Dice,
        bet_amount,
        multiplier,
        OutcomeDetail::Dice { roll, chance_bps },
    )
}
