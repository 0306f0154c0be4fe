//! Error types for the Luckbox wagering core
//!
//! Every rejection carries enough context to tell "nothing happened" apart
//! from "outcome determined but not yet durable".

use crate::games::types::ResolutionOutcome;

/// Root error type for all wager operations
#[derive(Debug, thiserror::Error)]
pub enum CasinoError {
    /// Bet below minimum, above balance, or malformed game parameters.
    /// Raised before any draw is consumed.
    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    /// Reveal/cash-out against a round that is resolved, already revealed,
    /// or owned by someone else.
    #[error("Round state conflict: {0}")]
    RoundStateConflict(String),

    /// Account Store or Ledger write failed. When `outcome` is present the
    /// wager is already resolved and must be persisted by a retry with the
    /// same wager id.
    #[error("Persistence failure for wager {wager_id}: {reason}")]
    PersistenceFailure {
        wager_id: String,
        reason: String,
        outcome: Option<Box<ResolutionOutcome>>,
    },

    /// A (server seed, nonce) pair was consumed by two different wagers.
    #[error("Fairness violation: {0}")]
    FairnessViolation(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Account Store / Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Player not found: {0}")]
    PlayerNotFound(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },
}

impl CasinoError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CasinoError::InvalidWager(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CasinoError::RoundStateConflict(msg.into())
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CasinoError::PersistenceFailure { .. })
    }

    /// Whether an outcome was determined before the error surfaced.
    pub fn outcome_determined(&self) -> bool {
        matches!(
            self,
            CasinoError::PersistenceFailure {
                outcome: Some(_),
                ..
            }
        )
    }
}

impl From<serde_json::Error> for CasinoError {
    fn from(e: serde_json::Error) -> Self {
        CasinoError::InvalidWager(format!("malformed wager: {}", e))
    }
}

// Convenience type alias for Results
pub type CasinoResult<T> = Result<T, CasinoError>;
