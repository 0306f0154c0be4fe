//! House-edge policy and exact payout arithmetic shared by every resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis-point denominator (10_000 = 100%).
pub const BPS: u128 = 10_000;

/// Default return-to-player for variable-odds games (0.97).
pub const DEFAULT_RTP_BPS: u32 = 9_700;

/// Fixed coinflip return on a win.
pub const COINFLIP_MULTIPLIER: u64 = 2;

/// Crash multipliers are expressed in hundredths (100 = 1.00x).
pub const CRASH_MIN_HUNDREDTHS: u64 = 100;
pub const CRASH_MAX_HUNDREDTHS: u64 = 1_000_000;

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Exact non-negative rational multiplier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Multiplier {
    pub numerator: u128,
    pub denominator: u128,
}

impl Multiplier {
    pub const ZERO: Multiplier = Multiplier {
        numerator: 0,
        denominator: 1,
    };

    pub const ONE: Multiplier = Multiplier {
        numerator: 1,
        denominator: 1,
    };

    /// `numerator / denominator`, reduced. A zero denominator yields zero.
    pub fn ratio(numerator: u128, denominator: u128) -> Self {
        if denominator == 0 || numerator == 0 {
            return Self::ZERO;
        }
        let g = gcd(numerator, denominator);
        Self {
            numerator: numerator / g,
            denominator: denominator / g,
        }
    }

    pub fn whole(value: u64) -> Self {
        Self::ratio(value as u128, 1)
    }

    /// Basis points, e.g. 9_700 → 0.97.
    pub fn from_bps(bps: u32) -> Self {
        Self::ratio(bps as u128, BPS)
    }

    /// Hundredths, e.g. 250 → 2.5.
    pub fn from_hundredths(hundredths: u64) -> Self {
        Self::ratio(hundredths as u128, 100)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Product, reduced after each step so intermediate terms stay small.
    pub fn times(self, other: Multiplier) -> Multiplier {
        if self.is_zero() || other.is_zero() {
            return Self::ZERO;
        }
        let g1 = gcd(self.numerator, other.denominator);
        let g2 = gcd(other.numerator, self.denominator);
        Self::ratio(
            (self.numerator / g1).saturating_mul(other.numerator / g2),
            (self.denominator / g2).saturating_mul(other.denominator / g1),
        )
    }

    /// `floor(amount × self)`, saturating at `u64::MAX`.
    pub fn apply(&self, amount: u64) -> u64 {
        let amount = amount as u128;
        let gross = match amount.checked_mul(self.numerator) {
            Some(product) => product / self.denominator,
            // Split to avoid the overflow: floor(a·n/d) = (a/d)·n + floor((a%d)·n/d)
            None => {
                let whole = (amount / self.denominator).saturating_mul(self.numerator);
                let rest = (amount % self.denominator).saturating_mul(self.numerator);
                whole.saturating_add(rest / self.denominator)
            }
        };
        gross.min(u64::MAX as u128) as u64
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl PartialEq for Multiplier {
    fn eq(&self, other: &Self) -> bool {
        match (
            self.numerator.checked_mul(other.denominator),
            other.numerator.checked_mul(self.denominator),
        ) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            // Constructors keep both sides reduced
            _ => self.numerator == other.numerator && self.denominator == other.denominator,
        }
    }
}

impl Eq for Multiplier {}

impl PartialOrd for Multiplier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let lhs = self.numerator.checked_mul(other.denominator)?;
        let rhs = other.numerator.checked_mul(self.denominator)?;
        Some(lhs.cmp(&rhs))
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}x", self.as_f64())
    }
}

/// Compounding multiplier for sequential-reveal games.
///
/// `steps` holds `(cells, safe_cells)` at every successful reveal; the result
/// is `∏ cells / safe_cells` scaled once by `rtp_bps`.
pub fn compounding_multiplier(
    steps: impl IntoIterator<Item = (u32, u32)>,
    rtp_bps: u32,
) -> Multiplier {
    steps
        .into_iter()
        .fold(Multiplier::ONE, |acc, (cells, safe)| {
            acc.times(Multiplier::ratio(cells as u128, safe as u128))
        })
        .times(Multiplier::from_bps(rtp_bps))
}

/// House policy applied uniformly across resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousePolicy {
    /// Return-to-player for variable-odds games, in basis points
    pub rtp_bps: u32,
    /// Share of the battle pot paid to the winning side, in basis points
    pub battle_pot_bps: u32,
}

impl Default for HousePolicy {
    fn default() -> Self {
        Self {
            rtp_bps: DEFAULT_RTP_BPS,
            battle_pot_bps: BPS as u32,
        }
    }
}

impl HousePolicy {
    pub fn rtp(&self) -> Multiplier {
        Multiplier::from_bps(self.rtp_bps)
    }

    pub fn battle_pot(&self) -> Multiplier {
        Multiplier::from_bps(self.battle_pot_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_reduces() {
        let m = Multiplier::ratio(200, 100);
        assert_eq!(m.numerator, 2);
        assert_eq!(m.denominator, 1);
        assert_eq!(m, Multiplier::whole(2));
        assert_eq!(Multiplier::ratio(5, 0), Multiplier::ZERO);
    }

    #[test]
    fn test_apply_floors() {
        let m = Multiplier::ratio(97, 50); // 1.94
        assert_eq!(m.apply(100), 194);
        assert_eq!(m.apply(3), 5); // 5.82
        assert_eq!(Multiplier::ZERO.apply(1_000), 0);
        assert_eq!(Multiplier::whole(2).apply(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_times_and_ordering() {
        let a = Multiplier::ratio(25, 20);
        let b = Multiplier::ratio(24, 19);
        let product = a.times(b);
        assert_eq!(product, Multiplier::ratio(600, 380));
        assert!(product > a);
        assert!(Multiplier::from_bps(9_700) < Multiplier::ONE);
    }

    #[test]
    fn test_compounding_multiplier_closed_form() {
        // 25 tiles, 5 mines, three safe reveals
        let m = compounding_multiplier([(25, 20), (24, 19), (23, 18)], 9_700);
        let expected = Multiplier::ratio(25 * 24 * 23 * 97, 20 * 19 * 18 * 100);
        assert_eq!(m, expected);
        assert_eq!(m.apply(100), 195);
    }
}
