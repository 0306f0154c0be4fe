//! European single-zero wheel.
//!
//! Every bet is evaluated against one `next_int(0, 36)` draw. Return
//! multipliers are fixed by the house table below (stake included); the
//! client never supplies its own odds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::Multiplier;
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const WHEEL_MAX: u64 = 36;

const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

/// Pocket color
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PocketColor {
    Red,
    Black,
    Green,
}

impl fmt::Display for PocketColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PocketColor::Red => write!(f, "red"),
            PocketColor::Black => write!(f, "black"),
            PocketColor::Green => write!(f, "green"),
        }
    }
}

pub fn color_of(number: u8) -> PocketColor {
    if number == 0 {
        PocketColor::Green
    } else if RED_NUMBERS.contains(&number) {
        PocketColor::Red
    } else {
        PocketColor::Black
    }
}

/// Bet kinds accepted on the table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouletteBetType {
    Number,
    Red,
    Black,
    Green,
    Odd,
    Even,
    Low,
    High,
}

impl RouletteBetType {
    /// Return multiplier including the stake.
    pub fn payout(&self) -> u64 {
        match self {
            RouletteBetType::Number | RouletteBetType::Green => 36,
            _ => 2,
        }
    }

    /// Pockets out of 37 that win this bet.
    pub fn winning_pockets(&self) -> u64 {
        match self {
            RouletteBetType::Number | RouletteBetType::Green => 1,
            _ => 18,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteBet {
    pub bet_type: RouletteBetType,
    /// Only for `number` bets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteBetResult {
    pub bet: RouletteBet,
    pub won: bool,
    pub payout: u64,
}

impl RouletteBet {
    pub fn wins_on(&self, number: u8) -> bool {
        match self.bet_type {
            RouletteBetType::Number => self.value == Some(number),
            RouletteBetType::Red => color_of(number) == PocketColor::Red,
            RouletteBetType::Black => color_of(number) == PocketColor::Black,
            RouletteBetType::Green => number == 0,
            RouletteBetType::Odd => number != 0 && number % 2 == 1,
            RouletteBetType::Even => number != 0 && number % 2 == 0,
            RouletteBetType::Low => (1..=18).contains(&number),
            RouletteBetType::High => (19..=36).contains(&number),
        }
    }
}

/// Check the bet slip and return the total stake.
pub fn validate(bets: &[RouletteBet]) -> CasinoResult<u64> {
    if bets.is_empty() {
        return Err(CasinoError::invalid("roulette wager has no bets"));
    }

    let mut total = 0u64;
    for bet in bets {
        if bet.amount == 0 {
            return Err(CasinoError::invalid("roulette bet amount must be positive"));
        }
        match (bet.bet_type, bet.value) {
            (RouletteBetType::Number, Some(v)) if v as u64 <= WHEEL_MAX => {}
            (RouletteBetType::Number, _) => {
                return Err(CasinoError::invalid("number bet needs a value in 0..=36"));
            }
            (_, Some(_)) => {
                return Err(CasinoError::invalid(format!(
                    "{:?} bet does not take a value",
                    bet.bet_type
                )));
            }
            _ => {}
        }
        total = total
            .checked_add(bet.amount)
            .ok_or_else(|| CasinoError::invalid("roulette stake overflows"))?;
    }
    Ok(total)
}

/// Resolve every bet against one spin. `bets` must have passed [`validate`].
pub fn resolve(bets: &[RouletteBet], source: &mut dyn RandomSource) -> ResolutionOutcome {
    let number = source.next_int(0, WHEEL_MAX) as u8;
    let color = color_of(number);

    let results: Vec<RouletteBetResult> = bets
        .iter()
        .map(|bet| {
            let won = bet.wins_on(number);
            let payout = if won {
                bet.amount.saturating_mul(bet.bet_type.payout())
            } else {
                0
            };
            RouletteBetResult {
                bet: bet.clone(),
                won,
                payout,
            }
        })
        .collect();

    let wagered: u64 = bets.iter().map(|b| b.amount).sum();
    let payout: u64 = results.iter().map(|r| r.payout).sum();

    ResolutionOutcome::from_payout(
        GameType::Roulette,
        wagered,
        payout,
        OutcomeDetail::Roulette {
            number,
            color,
            bets: results,
        },
    )
}

/// Theoretical return per unit staked for a bet type.
pub fn theoretical_return(bet_type: RouletteBetType) -> Multiplier {
    Multiplier::ratio(
        (bet_type.payout() * bet_type.winning_pockets()) as u128,
        WHEEL_MAX as u128 + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::{FairnessEngine, ServerCommitment};
    use crate::games::testing::ScriptedSource;

    fn bet(bet_type: RouletteBetType, value: Option<u8>, amount: u64) -> RouletteBet {
        RouletteBet {
            bet_type,
            value,
            amount,
        }
    }

    #[test]
    fn test_wheel_layout() {
        assert_eq!(color_of(0), PocketColor::Green);
        assert_eq!(color_of(32), PocketColor::Red);
        assert_eq!(color_of(15), PocketColor::Black);
        let reds = (1..=36).filter(|n| color_of(*n) == PocketColor::Red).count();
        assert_eq!(reds, 18);
    }

    #[test]
    fn test_red_on_32_scenario() {
        let mut source = ScriptedSource::ints(&[(32, 0, WHEEL_MAX)]);
        let outcome = resolve(&[bet(RouletteBetType::Red, None, 100)], &mut source);
        assert!(outcome.won);
        assert_eq!(outcome.payout, 200);
        assert_eq!(outcome.profit, 100);
        match outcome.detail {
            OutcomeDetail::Roulette { number, color, .. } => {
                assert_eq!(number, 32);
                assert_eq!(color, PocketColor::Red);
            }
            _ => panic!("expected roulette detail"),
        }
    }

    #[test]
    fn test_zero_loses_outside_bets() {
        let bets = vec![
            bet(RouletteBetType::Even, None, 10),
            bet(RouletteBetType::Low, None, 10),
            bet(RouletteBetType::Black, None, 10),
            bet(RouletteBetType::Green, None, 10),
        ];
        let mut source = ScriptedSource::ints(&[(0, 0, WHEEL_MAX)]);
        let outcome = resolve(&bets, &mut source);
        assert_eq!(outcome.bet_amount, 40);
        assert_eq!(outcome.payout, 360);
        assert_eq!(outcome.profit, 320);
    }

    #[test]
    fn test_mixed_slip() {
        let bets = vec![
            bet(RouletteBetType::Number, Some(19), 5),
            bet(RouletteBetType::High, None, 20),
            bet(RouletteBetType::Odd, None, 20),
            bet(RouletteBetType::Red, None, 20),
        ];
        // 19 is red, odd and high
        let mut source = ScriptedSource::ints(&[(19, 0, WHEEL_MAX)]);
        let outcome = resolve(&bets, &mut source);
        assert_eq!(outcome.payout, 5 * 36 + 40 + 40 + 40);
        assert_eq!(outcome.multiplier.apply(outcome.bet_amount), outcome.payout);
    }

    #[test]
    fn test_validation() {
        assert!(validate(&[]).is_err());
        assert!(validate(&[bet(RouletteBetType::Number, None, 10)]).is_err());
        assert!(validate(&[bet(RouletteBetType::Number, Some(37), 10)]).is_err());
        assert!(validate(&[bet(RouletteBetType::Red, Some(3), 10)]).is_err());
        assert!(validate(&[bet(RouletteBetType::Red, None, 0)]).is_err());
        assert_eq!(
            validate(&[
                bet(RouletteBetType::Red, None, 10),
                bet(RouletteBetType::Number, Some(0), 5),
            ])
            .unwrap(),
            15
        );
    }

    #[test]
    fn test_empirical_return_below_one() {
        let kinds = [
            (RouletteBetType::Number, Some(7)),
            (RouletteBetType::Red, None),
            (RouletteBetType::Black, None),
            (RouletteBetType::Green, None),
            (RouletteBetType::Odd, None),
            (RouletteBetType::Even, None),
            (RouletteBetType::Low, None),
            (RouletteBetType::High, None),
        ];
        let trials = 200_000u64;
        let numbers: Vec<u8> = (0..trials)
            .map(|i| {
                let mut engine = FairnessEngine::begin(
                    ServerCommitment::from_secret("wheel-stats"),
                    format!("spin-{}", i),
                );
                engine.next_int(0, WHEEL_MAX) as u8
            })
            .collect();

        for (kind, value) in kinds {
            let slip = bet(kind, value, 1);
            let returned: u64 = numbers
                .iter()
                .filter(|n| slip.wins_on(**n))
                .map(|_| kind.payout())
                .sum();
            let empirical = returned as f64 / trials as f64;
            let theoretical = theoretical_return(kind).as_f64();
            assert!(theoretical < 1.0);
            if kind.winning_pockets() > 1 {
                assert!(empirical < 1.0, "{:?}: empirical {:.4}", kind, empirical);
            }
            // Single-number bets have far more variance than even-money bets
            let tolerance = if kind.winning_pockets() == 1 { 0.08 } else { 0.02 };
            assert!(
                (empirical - theoretical).abs() < tolerance,
                "{:?}: empirical {:.4}, theoretical {:.4}",
                kind,
                empirical,
                theoretical
            );
        }
    }
}
