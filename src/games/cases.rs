//! Case opening: pay the case price, receive one weighted draw per case.

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::loot::{CaseDefinition, LootDrop};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const MAX_CASES_PER_OPEN: u32 = 5;

/// Check the count and return the stake (`price × count`).
pub fn validate(case: &CaseDefinition, count: u32) -> CasinoResult<u64> {
    if count == 0 || count > MAX_CASES_PER_OPEN {
        return Err(CasinoError::invalid(format!(
            "case count must be within [1, {}], got {}",
            MAX_CASES_PER_OPEN, count
        )));
    }
    case.price
        .checked_mul(count as u64)
        .ok_or_else(|| CasinoError::invalid("case stake overflows"))
}

/// Open `count` cases, one fairness round each.
pub fn open(case: &CaseDefinition, count: u32, source: &mut dyn RandomSource) -> ResolutionOutcome {
    let mut drops = Vec::with_capacity(count as usize);
    for i in 0..count {
        if i > 0 {
            source.advance_round();
        }
        drops.push(LootDrop::from(case.table.draw(source)));
    }

    let payout = drops.iter().map(|d| d.value).fold(0u64, u64::saturating_add);
    let stake = case.price.saturating_mul(count as u64);

    ResolutionOutcome::from_payout(
        GameType::Case,
        stake,
        payout,
        OutcomeDetail::Case {
            case_id: case.id.clone(),
            drops,
        },
    )
}
