//! Pieces shared by the sequential-reveal games (mines, tower).

use serde::{Deserialize, Serialize};

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::RandomSource;
use crate::games::policy::Multiplier;
use crate::games::types::ResolutionOutcome;

/// Lifecycle of a sequential-reveal round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevealStatus {
    Active,
    HitHazard,
    CashedOut,
    Cleared,
    Forfeited,
}

impl RevealStatus {
    pub fn ensure_active(&self) -> CasinoResult<()> {
        match self {
            RevealStatus::Active => Ok(()),
            other => Err(CasinoError::conflict(format!("round already resolved ({:?})", other))),
        }
    }
}

/// What a single reveal produced.
#[derive(Debug, Clone)]
pub enum RevealResult {
    /// Safe cell; the round continues at `multiplier`.
    Safe { multiplier: Multiplier },
    /// Hazard hit or board cleared; the round is over.
    Finished(ResolutionOutcome),
}

/// Mark `hazards` of `cells` positions, drawing one index per hazard
/// (partial Fisher-Yates over the remaining positions).
pub fn place_hazards(cells: u32, hazards: u32, source: &mut dyn RandomSource) -> Vec<bool> {
    debug_assert!(hazards <= cells);
    let mut pool: Vec<u32> = (0..cells).collect();
    let mut layout = vec![false; cells as usize];
    for i in 0..hazards as usize {
        let j = source.next_int(i as u64, (cells - 1) as u64) as usize;
        pool.swap(i, j);
        layout[pool[i] as usize] = true;
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::{FairnessEngine, ServerCommitment};
    use crate::games::testing::ScriptedSource;

    #[test]
    fn test_exact_hazard_count() {
        for hazards in [1, 5, 12, 24] {
            let mut engine = FairnessEngine::begin(
                ServerCommitment::from_secret("hazards"),
                format!("h{}", hazards),
            );
            let layout = place_hazards(25, hazards, &mut engine);
            assert_eq!(layout.len(), 25);
            assert_eq!(layout.iter().filter(|m| **m).count(), hazards as usize);
            assert_eq!(engine.consumed().len(), hazards as usize);
        }
    }

    #[test]
    fn test_scripted_placement() {
        // First draw swaps index 0 with 3, second keeps index 1 in place
        let mut source = ScriptedSource::ints(&[(3, 0, 4), (1, 1, 4)]);
        let layout = place_hazards(5, 2, &mut source);
        assert_eq!(layout, vec![false, true, false, true, false]);
    }

    #[test]
    fn test_status_guard() {
        assert!(RevealStatus::Active.ensure_active().is_ok());
        assert!(matches!(
            RevealStatus::CashedOut.ensure_active(),
            Err(CasinoError::RoundStateConflict(_))
        ));
    }
}
