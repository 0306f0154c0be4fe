pub mod battle;
pub mod cases;
pub mod coinflip;
pub mod crash;
pub mod dice;
pub mod loot;
pub mod mines;
pub mod policy;
pub mod processor;
pub mod reveal;
pub mod roulette;
pub mod rounds;
pub mod tower;
pub mod types;
pub mod upgrade;

#[cfg(test)]
pub(crate) mod testing;

pub use loot::{CaseCatalog, CaseConfig, LootDrop, LootEntry, LootTable, Rarity};
pub use policy::{HousePolicy, Multiplier};
pub use processor::{BetLimits, GameProcessor};
pub use rounds::{RoundAction, RoundRegistry, RoundView};
pub use types::*;
