//! Ascending-multiplier game.
//!
//! The crash point is drawn once when the round starts and never changes;
//! the live climb is playback of that fixed value. Multipliers are in
//! hundredths (100 = 1.00x).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::{
    HousePolicy, Multiplier, BPS, CRASH_MAX_HUNDREDTHS, CRASH_MIN_HUNDREDTHS,
};
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

/// Growth rate of the live multiplier per elapsed millisecond.
const GROWTH_PER_MS: f64 = 0.000_06;

const DRAW_SPACE: u128 = 1 << 32;

/// Lowest cash-out target accepted in auto mode (1.01x).
pub const MIN_TARGET_HUNDREDTHS: u64 = 101;

/// `floor(rtp × 100 / (1 − u))`, clamped to [1.00x, 10000x].
///
/// `P(crash ≥ x) = rtp / x`, so every cash-out target returns `rtp` on
/// average.
pub fn crash_point(uniform: f64, policy: &HousePolicy) -> u64 {
    // Draws are k / 2^32, so the division is carried out exactly on k
    let k = ((uniform * DRAW_SPACE as f64) as u128).min(DRAW_SPACE - 1);
    let tail = DRAW_SPACE - k;
    let raw = policy.rtp_bps as u128 * DRAW_SPACE / (BPS / 100 * tail);
    (raw.min(CRASH_MAX_HUNDREDTHS as u128) as u64).max(CRASH_MIN_HUNDREDTHS)
}

pub fn draw_crash_point(policy: &HousePolicy, source: &mut dyn RandomSource) -> u64 {
    crash_point(source.next_uniform(), policy)
}

/// Live multiplier after `elapsed` time in the round.
pub fn multiplier_at(elapsed: Duration) -> u64 {
    let ms = elapsed.as_millis() as f64;
    let value = (100.0 * (GROWTH_PER_MS * ms).exp()).floor();
    if value.is_finite() {
        (value as u64).clamp(CRASH_MIN_HUNDREDTHS, CRASH_MAX_HUNDREDTHS)
    } else {
        CRASH_MAX_HUNDREDTHS
    }
}

pub fn validate_target(target_hundredths: u64) -> CasinoResult<()> {
    if !(MIN_TARGET_HUNDREDTHS..=CRASH_MAX_HUNDREDTHS).contains(&target_hundredths) {
        return Err(CasinoError::invalid(format!(
            "crash target must be within [{}, {}] hundredths, got {}",
            MIN_TARGET_HUNDREDTHS, CRASH_MAX_HUNDREDTHS, target_hundredths
        )));
    }
    Ok(())
}

/// Settle a crash round against a cash-out point (`None` = never cashed out).
pub fn settle(bet_amount: u64, crash_point: u64, cashout: Option<u64>) -> ResolutionOutcome {
    let multiplier = match cashout {
        Some(at) if at <= crash_point => Multiplier::from_hundredths(at),
        _ => Multiplier::ZERO,
    };

    ResolutionOutcome::settle(
        GameType::Crash,
        bet_amount,
        multiplier,
        OutcomeDetail::Crash {
            crash_point_hundredths: crash_point,
            cashout_hundredths: cashout.filter(|at| *at <= crash_point),
        },
    )
}

/// Auto mode: target fixed before the draw.
pub fn resolve_auto(
    bet_amount: u64,
    target_hundredths: u64,
    policy: &HousePolicy,
    source: &mut dyn RandomSource,
) -> ResolutionOutcome {
    let point = draw_crash_point(policy, source);
    settle(bet_amount, point, Some(target_hundredths))
}

/// Live round state held between start and cash-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashRound {
    pub crash_point_hundredths: u64,
}

impl CrashRound {
    pub fn start(policy: &HousePolicy, source: &mut dyn RandomSource) -> Self {
        Self {
            crash_point_hundredths: draw_crash_point(policy, source),
        }
    }

    /// Cash out after `elapsed`; a climb past the crash point is a loss.
    pub fn cash_out(&self, bet_amount: u64, elapsed: Duration) -> ResolutionOutcome {
        let current = multiplier_at(elapsed);
        settle(bet_amount, self.crash_point_hundredths, Some(current))
    }

    /// Round abandoned without cashing out.
    pub fn forfeit(&self, bet_amount: u64) -> ResolutionOutcome {
        settle(bet_amount, self.crash_point_hundredths, None)
    }
}
