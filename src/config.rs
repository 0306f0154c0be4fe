//! Configuration management with validation and defaults
//!
//! Values come from an optional TOML file, then `LUCKBOX_*` environment
//! variables, then validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::errors::{CasinoResult, ConfigurationError};
use crate::games::loot::{CaseCatalog, CaseConfig};
use crate::games::policy::{HousePolicy, BPS, DEFAULT_RTP_BPS};
use crate::games::processor::BetLimits;
use crate::games::types::GameType;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CasinoConfig {
    pub server: ServerConfig,
    pub house: HouseConfig,
    pub rounds: RoundsConfig,
    pub cases: Vec<CaseConfig>,
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// House edge and stake limits
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HouseConfig {
    pub rtp_bps: u32,
    pub battle_pot_bps: u32,
    pub min_bet: u64,
    pub min_bet_overrides: HashMap<GameType, u64>,
    /// Balance given to a player on first contact
    pub starting_balance: u64,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            rtp_bps: DEFAULT_RTP_BPS,
            battle_pot_bps: BPS as u32,
            min_bet: 1,
            min_bet_overrides: HashMap::new(),
            starting_balance: 1_000,
        }
    }
}

/// Interactive round housekeeping
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundsConfig {
    pub round_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            round_timeout_secs: 300,
            sweep_interval_secs: 15,
        }
    }
}

impl CasinoConfig {
    pub fn house_policy(&self) -> HousePolicy {
        HousePolicy {
            rtp_bps: self.house.rtp_bps,
            battle_pot_bps: self.house.battle_pot_bps,
        }
    }

    pub fn bet_limits(&self) -> BetLimits {
        BetLimits {
            min_bet: self.house.min_bet,
            per_game: self.house.min_bet_overrides.clone(),
        }
    }

    /// Configured cases, or the built-in catalog when none are listed.
    pub fn catalog(&self) -> CasinoResult<CaseCatalog> {
        if self.cases.is_empty() {
            CaseCatalog::builtin()
        } else {
            CaseCatalog::from_configs(self.cases.clone())
        }
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.rounds.round_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rounds.sweep_interval_secs)
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CasinoResult<CasinoConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with<F>(&self, lookup: F) -> CasinoResult<CasinoConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => CasinoConfig::default(),
        };

        apply_overrides(&mut config, lookup)?;
        validate(&config)?;

        tracing::debug!(
            rtp_bps = config.house.rtp_bps,
            min_bet = config.house.min_bet,
            cases = config.cases.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn load_from_file(path: &str) -> CasinoResult<CasinoConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| {
                ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
            })?;

        toml::from_str(&content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    field: &str,
    value: String,
    reason: &str,
) -> Result<T, ConfigurationError> {
    value.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

fn apply_overrides<F>(config: &mut CasinoConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("LUCKBOX_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("LUCKBOX_PORT") {
        config.server.port = parse_var("LUCKBOX_PORT", port, "Invalid port number")?;
    }
    if let Some(rtp) = lookup("LUCKBOX_RTP_BPS") {
        config.house.rtp_bps = parse_var("LUCKBOX_RTP_BPS", rtp, "Expected basis points")?;
    }
    if let Some(min_bet) = lookup("LUCKBOX_MIN_BET") {
        config.house.min_bet = parse_var("LUCKBOX_MIN_BET", min_bet, "Expected a coin amount")?;
    }
    if let Some(balance) = lookup("LUCKBOX_STARTING_BALANCE") {
        config.house.starting_balance =
            parse_var("LUCKBOX_STARTING_BALANCE", balance, "Expected a coin amount")?;
    }
    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate configuration values
pub fn validate(config: &CasinoConfig) -> CasinoResult<()> {
    if config.server.port == 0 {
        return Err(invalid("server.port", 0, "Port cannot be zero").into());
    }
    if config.server.request_timeout_secs == 0 {
        return Err(invalid("server.request_timeout_secs", 0, "Timeout cannot be zero").into());
    }
    if config.house.rtp_bps == 0 || config.house.rtp_bps as u128 > BPS {
        return Err(
            invalid("house.rtp_bps", config.house.rtp_bps, "Must be within 1..=10000").into(),
        );
    }
    if config.house.battle_pot_bps == 0 || config.house.battle_pot_bps as u128 > BPS {
        return Err(invalid(
            "house.battle_pot_bps",
            config.house.battle_pot_bps,
            "Must be within 1..=10000",
        )
        .into());
    }
    if config.house.min_bet == 0 {
        return Err(invalid("house.min_bet", 0, "Minimum bet must be positive").into());
    }
    if let Some((game, _)) = config.house.min_bet_overrides.iter().find(|(_, min)| **min == 0) {
        return Err(invalid(
            &format!("house.min_bet_overrides.{}", game),
            0,
            "Minimum bet must be positive",
        )
        .into());
    }
    if config.rounds.round_timeout_secs == 0 || config.rounds.sweep_interval_secs == 0 {
        return Err(ConfigurationError::ValidationFailed(
            "round timeout and sweep interval must be positive".to_string(),
        )
        .into());
    }

    config
        .catalog()
        .map_err(|e| ConfigurationError::ValidationFailed(format!("case catalog: {}", e)))?;
    Ok(())
}
