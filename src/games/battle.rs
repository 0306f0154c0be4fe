//! Case battles against locally simulated opponents.
//!
//! Every seat opens the same cases; seat 0 is the player, the rest are
//! house-run bots paying the same entry. One fairness round per case, with
//! seats drawing in seat order inside the round.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::loot::{CaseDefinition, LootDrop};
use crate::games::policy::HousePolicy;
use crate::games::types::{GameType, OutcomeDetail, ResolutionOutcome};

pub const MIN_SEATS: u32 = 2;
pub const MAX_SEATS: u32 = 4;
pub const MAX_BATTLE_CASES: usize = 10;
pub const PLAYER_SEAT: usize = 0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BattleMode {
    /// Highest total takes the pot
    Standard,
    /// Lowest total takes the pot
    Reverse,
    /// Seats 0-1 against seats 2-3, higher combined total splits the pot
    Team,
    /// Pot split evenly between all seats
    Coop,
    /// Wheel weighted by each seat's share of the pot
    Jackpot,
}

impl fmt::Display for BattleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleMode::Standard => write!(f, "standard"),
            BattleMode::Reverse => write!(f, "reverse"),
            BattleMode::Team => write!(f, "team"),
            BattleMode::Coop => write!(f, "coop"),
            BattleMode::Jackpot => write!(f, "jackpot"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleSeat {
    pub seat: usize,
    pub bot: bool,
    pub drops: Vec<LootDrop>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleSummary {
    pub mode: BattleMode,
    pub case_ids: Vec<String>,
    pub seats: Vec<BattleSeat>,
    /// Sum of every seat's drops
    pub pot: u64,
    /// Pot after the house pot share
    pub prize: u64,
    pub winners: Vec<usize>,
    /// Amount credited to seat 0
    pub player_payout: u64,
}

/// Check seats and cases; return the per-seat entry (sum of case prices).
pub fn validate(mode: BattleMode, players: u32, cases: &[&CaseDefinition]) -> CasinoResult<u64> {
    if !(MIN_SEATS..=MAX_SEATS).contains(&players) {
        return Err(CasinoError::invalid(format!(
            "battle needs {} to {} players, got {}",
            MIN_SEATS, MAX_SEATS, players
        )));
    }
    if mode == BattleMode::Team && players != 4 {
        return Err(CasinoError::invalid("team battles need exactly 4 players"));
    }
    if cases.is_empty() || cases.len() > MAX_BATTLE_CASES {
        return Err(CasinoError::invalid(format!(
            "battle needs 1 to {} cases, got {}",
            MAX_BATTLE_CASES,
            cases.len()
        )));
    }
    cases
        .iter()
        .try_fold(0u64, |acc, case| acc.checked_add(case.price))
        .ok_or_else(|| CasinoError::invalid("battle entry overflows"))
}

/// Run the battle. Inputs must have passed [`validate`].
pub fn resolve(
    mode: BattleMode,
    players: u32,
    cases: &[&CaseDefinition],
    policy: &HousePolicy,
    source: &mut dyn RandomSource,
) -> ResolutionOutcome {
    let seat_count = players as usize;
    let mut seats: Vec<BattleSeat> = (0..seat_count)
        .map(|seat| BattleSeat {
            seat,
            bot: seat != PLAYER_SEAT,
            drops: Vec::with_capacity(cases.len()),
            total: 0,
        })
        .collect();

    for (round, case) in cases.iter().enumerate() {
        if round > 0 {
            source.advance_round();
        }
        for seat in seats.iter_mut() {
            let drop = LootDrop::from(case.table.draw(source));
            seat.total = seat.total.saturating_add(drop.value);
            seat.drops.push(drop);
        }
    }

    let totals: Vec<u64> = seats.iter().map(|s| s.total).collect();
    let pot = totals.iter().fold(0u64, |acc, t| acc.saturating_add(*t));
    let prize = policy.battle_pot().apply(pot);
    let winners = pick_winners(mode, &totals, pot, source);

    let player_payout = if winners.contains(&PLAYER_SEAT) {
        prize / winners.len() as u64
    } else {
        0
    };
    let entry: u64 = cases.iter().map(|c| c.price).sum();

    tracing::debug!(%mode, players, pot, ?winners, "battle resolved");

    ResolutionOutcome::from_payout(
        GameType::Battle,
        entry,
        player_payout,
        OutcomeDetail::Battle(BattleSummary {
            mode,
            case_ids: cases.iter().map(|c| c.id.clone()).collect(),
            seats,
            pot,
            prize,
            winners,
            player_payout,
        }),
    )
}

fn pick_winners(
    mode: BattleMode,
    totals: &[u64],
    pot: u64,
    source: &mut dyn RandomSource,
) -> Vec<usize> {
    match mode {
        BattleMode::Standard => {
            let best = totals.iter().copied().max().unwrap_or(0);
            vec![break_tie(seats_with(totals, best), source)]
        }
        BattleMode::Reverse => {
            let worst = totals.iter().copied().min().unwrap_or(0);
            vec![break_tie(seats_with(totals, worst), source)]
        }
        BattleMode::Team => {
            let teams = [vec![0, 1], vec![2, 3]];
            let team_totals: Vec<u64> = teams
                .iter()
                .map(|team| team.iter().map(|seat| totals[*seat]).sum())
                .collect();
            let best = team_totals.iter().copied().max().unwrap_or(0);
            let team = break_tie(seats_with(&team_totals, best), source);
            teams[team].clone()
        }
        BattleMode::Coop => (0..totals.len()).collect(),
        BattleMode::Jackpot => vec![spin_wheel(totals, pot, source)],
    }
}

fn seats_with(totals: &[u64], value: u64) -> Vec<usize> {
    totals
        .iter()
        .enumerate()
        .filter(|(_, total)| **total == value)
        .map(|(seat, _)| seat)
        .collect()
}

/// One extra draw only when more than one seat is tied.
fn break_tie(tied: Vec<usize>, source: &mut dyn RandomSource) -> usize {
    if tied.len() == 1 {
        return tied[0];
    }
    let pick = source.next_int(0, tied.len() as u64 - 1) as usize;
    tied[pick]
}

/// Seat `i` wins with probability `totals[i] / pot`.
fn spin_wheel(totals: &[u64], pot: u64, source: &mut dyn RandomSource) -> usize {
    if pot == 0 {
        return source.next_int(0, totals.len() as u64 - 1) as usize;
    }
    let ticket = source.next_int(0, pot - 1);
    let mut upper = 0u64;
    for (seat, total) in totals.iter().enumerate() {
        upper += total;
        if ticket < upper {
            return seat;
        }
    }
    totals.len() - 1
}
