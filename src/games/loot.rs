//! Weighted loot tables and the case catalog.
//!
//! One table type serves case opening, battle draws and upgrade rewards.
//! Drop chances are percentages; they are stored internally as basis points
//! so the "sums to exactly 100" invariant is checked without float drift.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{CasinoError, CasinoResult};
use crate::fairness::{scale_to_range, RandomSource};

const FULL_TABLE_BPS: u32 = 10_000;

/// Rarity tier of a loot entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Uncommon => write!(f, "uncommon"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Epic => write!(f, "epic"),
            Rarity::Legendary => write!(f, "legendary"),
        }
    }
}

/// One row of a loot table as configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootEntry {
    pub label: String,
    pub rarity: Rarity,
    pub value: u64,
    /// Percent, e.g. 2.5
    pub drop_chance: f64,
}

impl LootEntry {
    pub fn new(label: &str, rarity: Rarity, value: u64, drop_chance: f64) -> Self {
        Self {
            label: label.to_string(),
            rarity,
            value,
            drop_chance,
        }
    }
}

/// An item handed to a player by a draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LootDrop {
    pub label: String,
    pub rarity: Rarity,
    pub value: u64,
}

impl From<&LootEntry> for LootDrop {
    fn from(entry: &LootEntry) -> Self {
        Self {
            label: entry.label.clone(),
            rarity: entry.rarity,
            value: entry.value,
        }
    }
}

/// Validated weighted table.
#[derive(Debug, Clone, Serialize)]
pub struct LootTable {
    entries: Vec<LootEntry>,
    #[serde(skip)]
    cumulative_bps: Vec<u32>,
}

fn chance_to_bps(label: &str, drop_chance: f64) -> CasinoResult<u32> {
    if !drop_chance.is_finite() || drop_chance <= 0.0 {
        return Err(CasinoError::invalid(format!(
            "drop chance for '{}' must be positive, got {}",
            label, drop_chance
        )));
    }
    let scaled = drop_chance * 100.0;
    let bps = scaled.round();
    if (scaled - bps).abs() > 1e-6 {
        return Err(CasinoError::invalid(format!(
            "drop chance for '{}' has more than two decimals: {}",
            label, drop_chance
        )));
    }
    Ok(bps as u32)
}

impl LootTable {
    /// Build a table; drop chances must be positive and sum to exactly 100.
    pub fn new(entries: Vec<LootEntry>) -> CasinoResult<Self> {
        if entries.is_empty() {
            return Err(CasinoError::invalid("loot table has no entries"));
        }

        let mut cumulative_bps = Vec::with_capacity(entries.len());
        let mut total = 0u32;
        for entry in &entries {
            total += chance_to_bps(&entry.label, entry.drop_chance)?;
            cumulative_bps.push(total);
        }

        if total != FULL_TABLE_BPS {
            return Err(CasinoError::invalid(format!(
                "drop chances sum to {}%, expected 100%",
                total as f64 / 100.0
            )));
        }

        Ok(Self {
            entries,
            cumulative_bps,
        })
    }

    pub fn entries(&self) -> &[LootEntry] {
        &self.entries
    }

    /// Sum of drop chances in percent; 100 for every constructed table.
    pub fn total_chance(&self) -> f64 {
        self.cumulative_bps.last().copied().unwrap_or(0) as f64 / 100.0
    }

    /// Index of the entry whose band contains `roll_bps` (0..10_000).
    fn select(&self, roll_bps: u32) -> usize {
        self.cumulative_bps
            .iter()
            .position(|&upper| roll_bps < upper)
            .unwrap_or(self.entries.len() - 1)
    }

    /// Draw one entry.
    pub fn draw(&self, source: &mut dyn RandomSource) -> &LootEntry {
        let roll = scale_to_range(source.next_uniform(), 0, (FULL_TABLE_BPS - 1) as u64) as u32;
        &self.entries[self.select(roll)]
    }

    /// Mean value of one draw.
    pub fn expected_value(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.value as f64 * e.drop_chance / 100.0)
            .sum()
    }
}

/// A purchasable case bound to a loot table.
#[derive(Debug, Clone, Serialize)]
pub struct CaseDefinition {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub table: LootTable,
}

/// Case configuration as it appears in TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseConfig {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub items: Vec<LootEntry>,
}

impl TryFrom<CaseConfig> for CaseDefinition {
    type Error = CasinoError;

    fn try_from(config: CaseConfig) -> CasinoResult<Self> {
        if config.price == 0 {
            return Err(CasinoError::invalid(format!("case '{}' has zero price", config.id)));
        }
        let table = LootTable::new(config.items)?;
        Ok(Self {
            id: config.id,
            name: config.name,
            price: config.price,
            table,
        })
    }
}

/// All cases on offer plus the upgrade reward table.
#[derive(Debug, Clone)]
pub struct CaseCatalog {
    cases: BTreeMap<String, CaseDefinition>,
    upgrade_rewards: LootTable,
}

impl CaseCatalog {
    pub fn from_configs(configs: Vec<CaseConfig>) -> CasinoResult<Self> {
        let mut cases = BTreeMap::new();
        for config in configs {
            let case = CaseDefinition::try_from(config)?;
            if cases.contains_key(&case.id) {
                return Err(CasinoError::invalid(format!("duplicate case id '{}'", case.id)));
            }
            cases.insert(case.id.clone(), case);
        }
        Ok(Self {
            cases,
            upgrade_rewards: default_upgrade_table()?,
        })
    }

    pub fn get(&self, id: &str) -> CasinoResult<&CaseDefinition> {
        self.cases
            .get(id)
            .ok_or_else(|| CasinoError::invalid(format!("unknown case '{}'", id)))
    }

    pub fn cases(&self) -> impl Iterator<Item = &CaseDefinition> {
        self.cases.values()
    }

    pub fn upgrade_rewards(&self) -> &LootTable {
        &self.upgrade_rewards
    }
}

/// Built-in catalog used when the configuration lists no cases.
pub fn default_case_configs() -> Vec<CaseConfig> {
    vec![
        CaseConfig {
            id: "starter".to_string(),
            name: "Starter Case".to_string(),
            price: 100,
            items: vec![
                LootEntry::new("Rusty Token", Rarity::Common, 10, 45.0),
                LootEntry::new("Copper Charm", Rarity::Common, 40, 25.0),
                LootEntry::new("Silver Ring", Rarity::Uncommon, 100, 18.0),
                LootEntry::new("Gold Chalice", Rarity::Rare, 250, 9.0),
                LootEntry::new("Ruby Crown", Rarity::Epic, 800, 2.5),
                LootEntry::new("Dragon Egg", Rarity::Legendary, 4_400, 0.5),
            ],
        },
        CaseConfig {
            id: "high-roller".to_string(),
            name: "High Roller Case".to_string(),
            price: 1_000,
            items: vec![
                LootEntry::new("Onyx Die", Rarity::Common, 300, 50.0),
                LootEntry::new("Jade Idol", Rarity::Uncommon, 800, 25.0),
                LootEntry::new("Sapphire Blade", Rarity::Rare, 1_500, 15.0),
                LootEntry::new("Phoenix Feather", Rarity::Epic, 2_500, 7.0),
                LootEntry::new("Crown of Ages", Rarity::Legendary, 7_300, 3.0),
            ],
        },
    ]
}

fn default_upgrade_table() -> CasinoResult<LootTable> {
    // Values are replaced by the upgrade target; only label and rarity matter
    LootTable::new(vec![
        LootEntry::new("Polished Relic", Rarity::Common, 1, 40.0),
        LootEntry::new("Gilded Relic", Rarity::Uncommon, 1, 30.0),
        LootEntry::new("Arcane Relic", Rarity::Rare, 1, 18.0),
        LootEntry::new("Mythic Relic", Rarity::Epic, 1, 9.0),
        LootEntry::new("Celestial Relic", Rarity::Legendary, 1, 3.0),
    ])
}

impl CaseCatalog {
    /// Catalog built from [`default_case_configs`].
    pub fn builtin() -> CasinoResult<Self> {
        Self::from_configs(default_case_configs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::{FairnessEngine, ServerCommitment};

    #[test]
    fn test_rejects_bad_sums() {
        let err = LootTable::new(vec![
            LootEntry::new("a", Rarity::Common, 1, 60.0),
            LootEntry::new("b", Rarity::Rare, 5, 30.0),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("expected 100%"));

        assert!(LootTable::new(vec![LootEntry::new("a", Rarity::Common, 1, 0.0)]).is_err());
        assert!(LootTable::new(vec![]).is_err());
    }

    #[test]
    fn test_fractional_chances_sum_exactly() {
        let table = LootTable::new(vec![
            LootEntry::new("a", Rarity::Common, 1, 33.33),
            LootEntry::new("b", Rarity::Common, 1, 33.33),
            LootEntry::new("c", Rarity::Common, 1, 33.34),
        ])
        .unwrap();
        assert_eq!(table.total_chance(), 100.0);
    }

    #[test]
    fn test_band_selection() {
        let table = LootTable::new(vec![
            LootEntry::new("a", Rarity::Common, 1, 50.0),
            LootEntry::new("b", Rarity::Rare, 5, 49.5),
            LootEntry::new("c", Rarity::Legendary, 100, 0.5),
        ])
        .unwrap();
        assert_eq!(table.select(0), 0);
        assert_eq!(table.select(4_999), 0);
        assert_eq!(table.select(5_000), 1);
        assert_eq!(table.select(9_949), 1);
        assert_eq!(table.select(9_950), 2);
        assert_eq!(table.select(9_999), 2);
        // Residual past the last band falls back to the last entry
        assert_eq!(table.select(10_000), 2);
    }

    #[test]
    fn test_draw_frequencies_converge() {
        let catalog = CaseCatalog::builtin().unwrap();
        let case = catalog.get("starter").unwrap();
        let mut engine = FairnessEngine::begin(
            ServerCommitment::from_secret("loot-freq"),
            "client",
        );
        let trials = 100_000;
        let mut counts = BTreeMap::new();
        for _ in 0..trials {
            let drop = case.table.draw(&mut engine);
            *counts.entry(drop.label.clone()).or_insert(0u32) += 1;
            engine.advance_round();
        }
        for entry in case.table.entries() {
            let observed = *counts.get(&entry.label).unwrap_or(&0) as f64 / trials as f64 * 100.0;
            let tolerance = (entry.drop_chance * 0.1).max(0.3);
            assert!(
                (observed - entry.drop_chance).abs() < tolerance,
                "{}: observed {:.3}%, expected {}%",
                entry.label,
                observed,
                entry.drop_chance
            );
        }
    }

    #[test]
    fn test_default_catalog_prices_above_expected_value() {
        let catalog = CaseCatalog::builtin().unwrap();
        for case in catalog.cases() {
            assert_eq!(case.table.total_chance(), 100.0);
            assert!(case.table.expected_value() < case.price as f64, "{}", case.id);
        }
        assert!(catalog.get("missing").is_err());
        assert_eq!(catalog.upgrade_rewards().total_chance(), 100.0);
    }
}
