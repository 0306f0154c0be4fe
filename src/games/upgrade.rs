//! Item upgrade: risk an item's value for a larger one at a chosen chance.

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::loot::{LootDrop, LootTable};
use crate::games::policy::{HousePolicy, Multiplier};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const MIN_CHANCE_PERCENT: u32 = 5;
pub const MAX_CHANCE_PERCENT: u32 = 95;

pub fn validate(chance_percent: u32) -> CasinoResult<()> {
    if !(MIN_CHANCE_PERCENT..=MAX_CHANCE_PERCENT).contains(&chance_percent) {
        return Err(CasinoError::invalid(format!(
            "upgrade chance must be within [{}, {}]%, got {}",
            MIN_CHANCE_PERCENT, MAX_CHANCE_PERCENT, chance_percent
        )));
    }
    Ok(())
}

/// `(100 / chance) × rtp`
pub fn success_multiplier(chance_percent: u32, policy: &HousePolicy) -> Multiplier {
    Multiplier::ratio(100, chance_percent as u128).times(policy.rtp())
}

/// Value of the item granted on success.
pub fn target_value(source_value: u64, chance_percent: u32, policy: &HousePolicy) -> u64 {
    success_multiplier(chance_percent, policy).apply(source_value)
}

/// One `next_int(1, 100)` roll; success iff `roll <= chance`. On success a
/// second draw picks the granted item's label and rarity from `rewards`.
pub fn resolve(
    source_value: u64,
    chance_percent: u32,
    policy: &HousePolicy,
    rewards: &LootTable,
    source: &mut dyn RandomSource,
) -> ResolutionOutcome {
    let roll = source.next_int(1, 100);
    let target = target_value(source_value, chance_percent, policy);

    let (multiplier, granted) = if roll <= chance_percent as u64 {
        let entry = rewards.draw(source);
        let item = LootDrop {
            label: entry.label.clone(),
            rarity: entry.rarity,
            value: target,
        };
        (success_multiplier(chance_percent, policy), Some(item))
    } else {
        (Multiplier::ZERO, None)
    };

    ResolutionOutcome::settle(
        GameType::Upgrade,
        source_value,
        multiplier,
        OutcomeDetail::Upgrade {
            chance_percent,
            roll,
            target_value: target,
            granted,
        },
    )
}
