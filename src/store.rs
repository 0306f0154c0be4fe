//! Account Store and Ledger seams plus in-memory implementations.
//!
//! Both stores are idempotent: an account delta is applied at most once per
//! `op_id`, and the ledger keeps the first record written for a wager id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::errors::StorageError;
use crate::fairness::FairnessReveal;
use crate::games::types::{GameType, ResolutionOutcome};

/// XP granted for a resolved wager.
pub fn xp_for_bet(bet_amount: u64) -> u64 {
    (bet_amount / 10).max(1)
}

/// `floor(sqrt(xp / 100)) + 1`
pub fn level_for_xp(xp: u64) -> u32 {
    let steps = xp / 100;
    let mut root = (steps as f64).sqrt() as u64;
    // Correct float error near perfect squares
    while root * root > steps {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= steps {
        root += 1;
    }
    root as u32 + 1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerAccount {
    pub player_id: String,
    pub balance: u64,
    pub xp: u64,
    pub level: u32,
    #[serde(default)]
    pub flags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Atomic change to one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountDelta {
    pub op_id: String,
    pub balance: i64,
    pub xp: u64,
}

impl AccountDelta {
    pub fn debit(op_id: impl Into<String>, amount: u64) -> Self {
        Self {
            op_id: op_id.into(),
            balance: -(amount.min(i64::MAX as u64) as i64),
            xp: 0,
        }
    }

    pub fn credit(op_id: impl Into<String>, amount: u64, xp: u64) -> Self {
        Self {
            op_id: op_id.into(),
            balance: amount.min(i64::MAX as u64) as i64,
            xp,
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_player(&self, player_id: &str) -> Result<PlayerAccount, StorageError>;

    /// Return the account, creating it with `starting_balance` if missing.
    async fn ensure_player(
        &self,
        player_id: &str,
        starting_balance: u64,
    ) -> Result<PlayerAccount, StorageError>;

    /// Apply `delta` once; a repeated `op_id` returns the account unchanged.
    async fn apply_delta(
        &self,
        player_id: &str,
        delta: &AccountDelta,
    ) -> Result<PlayerAccount, StorageError>;
}

/// One resolved wager, as appended to the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerRecord {
    pub wager_id: String,
    pub player_id: String,
    pub game_type: GameType,
    pub bet_amount: u64,
    pub payout: u64,
    pub profit: i64,
    pub outcome: ResolutionOutcome,
    pub fairness: FairnessReveal,
    pub balance_after: u64,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a record. Returns `false` if the wager id was already recorded.
    async fn append(&self, record: LedgerRecord) -> Result<bool, StorageError>;

    async fn find(&self, wager_id: &str) -> Result<Option<LedgerRecord>, StorageError>;

    /// Most recent records for a player, newest first.
    async fn history(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StorageError>;
}

#[derive(Default)]
struct AccountTable {
    accounts: HashMap<String, PlayerAccount>,
    /// `(player_id, op_id)` of every applied delta
    applied_ops: HashSet<(String, String)>,
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<AccountTable>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_player(&self, player_id: &str) -> Result<PlayerAccount, StorageError> {
        self.inner
            .read()
            .await
            .accounts
            .get(player_id)
            .cloned()
            .ok_or_else(|| StorageError::PlayerNotFound(player_id.to_string()))
    }

    async fn ensure_player(
        &self,
        player_id: &str,
        starting_balance: u64,
    ) -> Result<PlayerAccount, StorageError> {
        let mut table = self.inner.write().await;
        let account = table.accounts.entry(player_id.to_string()).or_insert_with(|| {
            tracing::info!(player_id, starting_balance, "player account created");
            let now = Utc::now();
            PlayerAccount {
                player_id: player_id.to_string(),
                balance: starting_balance,
                xp: 0,
                level: 1,
                flags: Vec::new(),
                created_at: now,
                updated_at: now,
            }
        });
        Ok(account.clone())
    }

    async fn apply_delta(
        &self,
        player_id: &str,
        delta: &AccountDelta,
    ) -> Result<PlayerAccount, StorageError> {
        let mut table = self.inner.write().await;
        let AccountTable {
            accounts,
            applied_ops,
        } = &mut *table;

        let account = accounts
            .get_mut(player_id)
            .ok_or_else(|| StorageError::PlayerNotFound(player_id.to_string()))?;

        let op_key = (player_id.to_string(), delta.op_id.clone());
        if applied_ops.contains(&op_key) {
            tracing::debug!(player_id, op_id = %delta.op_id, "account delta already applied");
            return Ok(account.clone());
        }

        let balance = if delta.balance < 0 {
            let required = delta.balance.unsigned_abs();
            account
                .balance
                .checked_sub(required)
                .ok_or(StorageError::InsufficientFunds {
                    balance: account.balance,
                    required,
                })?
        } else {
            account
                .balance
                .checked_add(delta.balance as u64)
                .ok_or_else(|| {
                    StorageError::WriteFailed(format!("balance overflow for {}", player_id))
                })?
        };

        account.balance = balance;
        account.xp = account.xp.saturating_add(delta.xp);
        account.level = level_for_xp(account.xp);
        account.updated_at = Utc::now();
        applied_ops.insert(op_key);
        Ok(account.clone())
    }
}

#[derive(Default)]
struct LedgerTable {
    records: Vec<LedgerRecord>,
    by_wager: HashMap<String, usize>,
}

/// Append-only in-memory ledger
#[derive(Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerTable>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, record: LedgerRecord) -> Result<bool, StorageError> {
        let mut table = self.inner.write().await;
        if table.by_wager.contains_key(&record.wager_id) {
            tracing::debug!(wager_id = %record.wager_id, "ledger record already present");
            return Ok(false);
        }
        let index = table.records.len();
        table.by_wager.insert(record.wager_id.clone(), index);
        table.records.push(record);
        Ok(true)
    }

    async fn find(&self, wager_id: &str) -> Result<Option<LedgerRecord>, StorageError> {
        let table = self.inner.read().await;
        Ok(table.by_wager.get(wager_id).map(|i| table.records[*i].clone()))
    }

    async fn history(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StorageError> {
        let table = self.inner.read().await;
        Ok(table
            .records
            .iter()
            .rev()
            .filter(|r| r.player_id == player_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
