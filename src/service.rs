//! Wager orchestration: per-player critical sections around
//! validate → debit → resolve → credit → persist, idempotent replay by wager
//! id, and the interactive round lifecycle.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::CasinoConfig;
use crate::errors::{CasinoError, CasinoResult, StorageError};
use crate::fairness::{FairnessAudit, FairnessEngine, FairnessReveal, SeedVault};
use crate::games::loot::CaseCatalog;
use crate::games::processor::GameProcessor;
use crate::games::rounds::{ActiveRound, RoundAction, RoundProgress, RoundRegistry, RoundView};
use crate::games::types::{GameParameters, ResolutionOutcome, RoundParameters};
use crate::metrics::MetricsRegistry;
use crate::store::{
    xp_for_bet, AccountDelta, AccountStore, InMemoryAccountStore, InMemoryLedger, Ledger,
    LedgerRecord, PlayerAccount,
};

/// A single-request wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRequest {
    pub player_id: String,
    /// Idempotency key; generated when absent
    #[serde(default)]
    pub wager_id: Option<String>,
    pub bet_amount: u64,
    #[serde(default)]
    pub client_seed: Option<String>,
    pub params: GameParameters,
}

/// Opens an interactive round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStartRequest {
    pub player_id: String,
    #[serde(default)]
    pub wager_id: Option<String>,
    pub bet_amount: u64,
    #[serde(default)]
    pub client_seed: Option<String>,
    pub params: RoundParameters,
}

/// Durable result of a settled wager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WagerReceipt {
    pub wager_id: String,
    pub player_id: String,
    pub outcome: ResolutionOutcome,
    pub new_balance: u64,
    pub xp: u64,
    pub level: u32,
    pub fairness: FairnessReveal,
    /// Commitment the player's next wager will be resolved under
    pub next_server_seed_hash: String,
    /// True when answered from the ledger for a retried request
    pub replayed: bool,
}

#[derive(Debug, Clone)]
pub enum RoundReply {
    Continue(RoundView),
    Settled(WagerReceipt),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub account: PlayerAccount,
    pub active_round: Option<RoundView>,
    pub next_server_seed_hash: String,
}

/// Resolved outcome whose persistence has not completed yet
#[derive(Clone)]
struct Unsettled {
    player_id: String,
    outcome: ResolutionOutcome,
    fairness: FairnessReveal,
}

pub struct CasinoService {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn Ledger>,
    processor: GameProcessor,
    rounds: RoundRegistry,
    vault: SeedVault,
    audit: FairnessAudit,
    unsettled: DashMap<String, Unsettled>,
    /// Wager ids whose stake was refunded; they cannot be reused
    voided: DashSet<String>,
    /// First player to present a wager id owns it
    wager_owners: DashMap<String, String>,
    player_locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: Arc<MetricsRegistry>,
    starting_balance: u64,
    round_timeout: Duration,
}

fn stake_op(wager_id: &str) -> String {
    format!("{}:stake", wager_id)
}

fn payout_op(wager_id: &str) -> String {
    format!("{}:payout", wager_id)
}

fn refund_op(wager_id: &str) -> String {
    format!("{}:refund", wager_id)
}

/// Storage failure before any outcome exists: nothing was resolved.
fn write_failed(wager_id: &str, e: StorageError) -> CasinoError {
    match e {
        StorageError::InsufficientFunds { balance, required } => CasinoError::invalid(format!(
            "bet {} exceeds balance {}",
            required, balance
        )),
        other => CasinoError::PersistenceFailure {
            wager_id: wager_id.to_string(),
            reason: other.to_string(),
            outcome: None,
        },
    }
}

impl CasinoService {
    /// Service backed by in-memory stores.
    pub fn in_memory(config: &CasinoConfig) -> CasinoResult<Self> {
        CasinoServiceBuilder::new(config.clone()).build()
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    pub fn catalog(&self) -> &CaseCatalog {
        self.processor.catalog()
    }

    pub fn processor(&self) -> &GameProcessor {
        &self.processor
    }

    fn player_lock(&self, player_id: &str) -> Arc<Mutex<()>> {
        self.player_locks
            .entry(player_id.to_string())
            .or_default()
            .clone()
    }

    /// Reserve the wager id for this player before anything is debited.
    fn claim_wager(&self, wager_id: &str, player_id: &str) -> CasinoResult<()> {
        let owner = self
            .wager_owners
            .entry(wager_id.to_string())
            .or_insert_with(|| player_id.to_string());
        if owner.value() != player_id {
            return Err(CasinoError::invalid(format!(
                "wager id {} belongs to another player",
                wager_id
            )));
        }
        Ok(())
    }

    /// Publish the commitment for the player's next wager.
    pub fn commit_seed(&self, player_id: &str) -> String {
        self.vault.peek(player_id)
    }

    pub async fn player(&self, player_id: &str) -> CasinoResult<PlayerSummary> {
        let account = self.accounts.ensure_player(player_id, self.starting_balance).await?;
        let active_round = self
            .rounds
            .active_for(player_id)
            .and_then(|round_id| self.rounds.view(&round_id));
        Ok(PlayerSummary {
            account,
            active_round,
            next_server_seed_hash: self.vault.peek(player_id),
        })
    }

    pub async fn history(&self, player_id: &str, limit: usize) -> CasinoResult<Vec<LedgerRecord>> {
        Ok(self.ledger.history(player_id, limit).await?)
    }

    /// Resolve a single-request wager. A retry with the same wager id
    /// returns the recorded receipt, or finishes persisting a parked outcome,
    /// without drawing again.
    pub async fn play(&self, request: WagerRequest) -> CasinoResult<WagerReceipt> {
        let wager_id = request
            .wager_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let player_id = request.player_id.as_str();
        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        self.claim_wager(&wager_id, player_id)?;
        if let Some(receipt) = self.replay(&wager_id, player_id).await? {
            return Ok(receipt);
        }

        let account = self
            .accounts
            .ensure_player(player_id, self.starting_balance)
            .await
            .map_err(|e| write_failed(&wager_id, e))?;

        if let Err(e) = self
            .processor
            .validate(request.bet_amount, &request.params, account.balance)
        {
            self.metrics.record_rejected();
            debug!(%wager_id, player_id, error = %e, "wager rejected");
            return Err(e);
        }

        self.accounts
            .apply_delta(
                player_id,
                &AccountDelta::debit(stake_op(&wager_id), request.bet_amount),
            )
            .await
            .map_err(|e| write_failed(&wager_id, e))?;

        let (commitment, _) = self.vault.take(player_id);
        let client_seed = request.client_seed.clone().unwrap_or_else(|| wager_id.clone());
        let mut engine = FairnessEngine::begin(commitment, client_seed);

        let outcome = match self
            .processor
            .resolve(request.bet_amount, &request.params, &mut engine)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.refund(player_id, &wager_id, request.bet_amount).await;
                return Err(e);
            }
        };

        if let Err(e) = self.audit.claim(engine.server_seed_hash(), engine.nonce(), &wager_id) {
            self.refund(player_id, &wager_id, request.bet_amount).await;
            return Err(e);
        }

        debug!(
            %wager_id,
            player_id,
            game = %outcome.game_type,
            payout = outcome.payout,
            "wager resolved"
        );
        self.settle(&wager_id, player_id, outcome, engine.reveal()).await
    }

    /// Open an interactive round and debit its stake.
    pub async fn start_round(&self, request: RoundStartRequest) -> CasinoResult<RoundView> {
        let wager_id = request
            .wager_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let player_id = request.player_id.as_str();
        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        self.claim_wager(&wager_id, player_id)?;
        // Retried start for a round that is still open
        if self.rounds.active_for(player_id).as_deref() == Some(wager_id.as_str()) {
            if let Some(view) = self.rounds.view(&wager_id) {
                return Ok(view);
            }
        }
        if self.unsettled.contains_key(&wager_id) || self.ledger.find(&wager_id).await?.is_some() {
            return Err(CasinoError::conflict(format!("round {} already resolved", wager_id)));
        }

        self.ensure_not_voided(&wager_id)?;
        self.rounds.ensure_free(player_id)?;
        let account = self
            .accounts
            .ensure_player(player_id, self.starting_balance)
            .await
            .map_err(|e| write_failed(&wager_id, e))?;
        if let Err(e) = self
            .processor
            .validate_round(request.bet_amount, &request.params, account.balance)
        {
            self.metrics.record_rejected();
            return Err(e);
        }

        self.accounts
            .apply_delta(
                player_id,
                &AccountDelta::debit(stake_op(&wager_id), request.bet_amount),
            )
            .await
            .map_err(|e| write_failed(&wager_id, e))?;

        let (commitment, _) = self.vault.take(player_id);
        let client_seed = request.client_seed.clone().unwrap_or_else(|| wager_id.clone());
        let mut engine = FairnessEngine::begin(commitment, client_seed);
        let game = self
            .processor
            .start_round(request.bet_amount, &request.params, &mut engine);

        if let Err(e) = self.audit.claim(engine.server_seed_hash(), engine.nonce(), &wager_id) {
            self.refund(player_id, &wager_id, request.bet_amount).await;
            return Err(e);
        }

        let round = ActiveRound::new(
            wager_id.clone(),
            wager_id.clone(),
            player_id.to_string(),
            request.bet_amount,
            game,
            engine,
        );
        let view = round.view();
        if let Err(e) = self.rounds.insert(round) {
            self.refund(player_id, &wager_id, request.bet_amount).await;
            return Err(e);
        }
        self.metrics.record_round_started();
        self.metrics.set_active_rounds(self.rounds.active_count());

        info!(
            round_id = %wager_id,
            player_id,
            game = %view.game_type,
            bet = request.bet_amount,
            "round started"
        );
        Ok(view)
    }

    /// Apply a reveal, cash-out or forfeit to the player's open round.
    pub async fn round_action(
        &self,
        round_id: &str,
        player_id: &str,
        action: RoundAction,
    ) -> CasinoResult<RoundReply> {
        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        if let Some(parked) = self.unsettled.get(round_id).map(|entry| entry.value().clone()) {
            if parked.player_id != player_id {
                return Err(CasinoError::conflict(format!(
                    "round {} does not belong to player {}",
                    round_id, player_id
                )));
            }
            let receipt = self
                .settle(round_id, player_id, parked.outcome, parked.fairness)
                .await?;
            return Ok(RoundReply::Settled(receipt));
        }

        let mut round = self.rounds.take(round_id, player_id)?;
        match round.apply(action) {
            Err(e) => {
                self.rounds.restore(round);
                Err(e)
            }
            Ok(RoundProgress::Continue(view)) => {
                self.rounds.restore(round);
                Ok(RoundReply::Continue(view))
            }
            Ok(RoundProgress::Finished(outcome)) => {
                self.rounds.finish(round_id, player_id);
                self.metrics.set_active_rounds(self.rounds.active_count());
                let ActiveRound { wager_id, engine, .. } = round;
                debug!(
                    %wager_id,
                    player_id,
                    ?action,
                    payout = outcome.payout,
                    "round resolved"
                );
                let receipt = self
                    .settle(&wager_id, player_id, outcome, engine.reveal())
                    .await?;
                Ok(RoundReply::Settled(receipt))
            }
        }
    }

    /// Forfeit rounds idle past the timeout. Returns how many were closed.
    pub async fn sweep_expired_rounds(&self) -> usize {
        let mut closed = 0;
        for (round_id, player_id) in self.rounds.expired(self.round_timeout) {
            match self.round_action(&round_id, &player_id, RoundAction::Forfeit).await {
                Ok(_) => {
                    closed += 1;
                    self.metrics.record_round_expired();
                    info!(%round_id, %player_id, "idle round forfeited");
                }
                Err(e) => warn!(%round_id, %player_id, error = %e, "failed to forfeit idle round"),
            }
        }
        closed
    }

    /// Re-attempt persistence of parked outcomes. Returns how many settled.
    pub async fn retry_unsettled(&self) -> usize {
        let parked: Vec<(String, String)> = self
            .unsettled
            .iter()
            .map(|entry| (entry.key().clone(), entry.player_id.clone()))
            .collect();

        let mut settled = 0;
        for (wager_id, player_id) in parked {
            let lock = self.player_lock(&player_id);
            let _guard = lock.lock().await;
            let Some(entry) = self.unsettled.get(&wager_id).map(|e| e.value().clone()) else {
                continue;
            };
            if self
                .settle(&wager_id, &player_id, entry.outcome, entry.fairness)
                .await
                .is_ok()
            {
                settled += 1;
            }
        }
        settled
    }

    pub fn unsettled_count(&self) -> usize {
        self.unsettled.len()
    }

    /// Periodic round expiry and settlement retry.
    pub fn spawn_housekeeping(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let expired = self.sweep_expired_rounds().await;
                let settled = self.retry_unsettled().await;
                if expired > 0 || settled > 0 {
                    debug!(expired, settled, "housekeeping pass");
                }
            }
        })
    }

    async fn replay(&self, wager_id: &str, player_id: &str) -> CasinoResult<Option<WagerReceipt>> {
        self.ensure_not_voided(wager_id)?;
        if self.rounds.view(wager_id).is_some() {
            return Err(CasinoError::conflict(format!("wager {} is an open round", wager_id)));
        }
        if let Some(record) = self.ledger.find(wager_id).await? {
            if record.player_id != player_id {
                return Err(CasinoError::invalid(format!(
                    "wager id {} belongs to another player",
                    wager_id
                )));
            }
            let account = self.accounts.get_player(player_id).await?;
            self.metrics.record_replayed();
            info!(wager_id, player_id, "replayed settled wager");
            return Ok(Some(WagerReceipt {
                wager_id: record.wager_id,
                player_id: record.player_id,
                outcome: record.outcome,
                new_balance: record.balance_after,
                xp: account.xp,
                level: account.level,
                fairness: record.fairness,
                next_server_seed_hash: self.vault.peek(player_id),
                replayed: true,
            }));
        }

        if let Some(parked) = self.unsettled.get(wager_id).map(|e| e.value().clone()) {
            if parked.player_id != player_id {
                return Err(CasinoError::invalid(format!(
                    "wager id {} belongs to another player",
                    wager_id
                )));
            }
            info!(wager_id, player_id, "retrying persistence of resolved wager");
            return self
                .settle(wager_id, player_id, parked.outcome, parked.fairness)
                .await
                .map(Some);
        }

        Ok(None)
    }

    /// Credit the payout and append the ledger record. Both writes are
    /// idempotent, so this runs again unchanged after a failure.
    async fn settle(
        &self,
        wager_id: &str,
        player_id: &str,
        outcome: ResolutionOutcome,
        fairness: FairnessReveal,
    ) -> CasinoResult<WagerReceipt> {
        let credit = AccountDelta::credit(
            payout_op(wager_id),
            outcome.payout,
            xp_for_bet(outcome.bet_amount),
        );

        let account = match self.accounts.apply_delta(player_id, &credit).await {
            Ok(account) => account,
            Err(e) => return Err(self.park(wager_id, player_id, outcome, fairness, e)),
        };

        let record = LedgerRecord {
            wager_id: wager_id.to_string(),
            player_id: player_id.to_string(),
            game_type: outcome.game_type,
            bet_amount: outcome.bet_amount,
            payout: outcome.payout,
            profit: outcome.profit,
            outcome: outcome.clone(),
            fairness: fairness.clone(),
            balance_after: account.balance,
            recorded_at: chrono::Utc::now(),
        };
        match self.ledger.append(record).await {
            Ok(true) => {}
            Ok(false) => {
                let held = match self.ledger.find(wager_id).await {
                    Ok(held) => held,
                    Err(e) => return Err(self.park(wager_id, player_id, outcome, fairness, e)),
                };
                if let Some(other) = held.filter(|r| r.player_id != player_id) {
                    let cause = StorageError::WriteFailed(format!(
                        "ledger holds wager {} for player {}",
                        wager_id, other.player_id
                    ));
                    return Err(self.park(wager_id, player_id, outcome, fairness, cause));
                }
                warn!(wager_id, player_id, "ledger already held a record for this wager");
            }
            Err(e) => return Err(self.park(wager_id, player_id, outcome, fairness, e)),
        }

        if self.unsettled.remove(wager_id).is_some() {
            info!(wager_id, player_id, "parked wager settled");
        }
        self.metrics.record_settled(&outcome);
        info!(
            wager_id,
            player_id,
            game = %outcome.game_type,
            bet = outcome.bet_amount,
            payout = outcome.payout,
            won = outcome.won,
            balance = account.balance,
            "wager settled"
        );

        Ok(WagerReceipt {
            wager_id: wager_id.to_string(),
            player_id: player_id.to_string(),
            outcome,
            new_balance: account.balance,
            xp: account.xp,
            level: account.level,
            fairness,
            next_server_seed_hash: self.vault.peek(player_id),
            replayed: false,
        })
    }

    fn park(
        &self,
        wager_id: &str,
        player_id: &str,
        outcome: ResolutionOutcome,
        fairness: FairnessReveal,
        cause: StorageError,
    ) -> CasinoError {
        self.metrics.record_persistence_failure();
        error!(wager_id, player_id, error = %cause, "failed to persist resolved wager");
        self.unsettled.insert(
            wager_id.to_string(),
            Unsettled {
                player_id: player_id.to_string(),
                outcome: outcome.clone(),
                fairness,
            },
        );
        CasinoError::PersistenceFailure {
            wager_id: wager_id.to_string(),
            reason: cause.to_string(),
            outcome: Some(Box::new(outcome)),
        }
    }

    fn ensure_not_voided(&self, wager_id: &str) -> CasinoResult<()> {
        if self.voided.contains(wager_id) {
            return Err(CasinoError::invalid(format!("wager id {} was voided", wager_id)));
        }
        Ok(())
    }

    async fn refund(&self, player_id: &str, wager_id: &str, amount: u64) {
        self.voided.insert(wager_id.to_string());
        let delta = AccountDelta::credit(refund_op(wager_id), amount, 0);
        if let Err(e) = self.accounts.apply_delta(player_id, &delta).await {
            error!(wager_id, player_id, error = %e, "failed to refund halted wager");
        }
    }
}

/// Builder for [`CasinoService`] with swappable stores
pub struct CasinoServiceBuilder {
    config: CasinoConfig,
    accounts: Option<Arc<dyn AccountStore>>,
    ledger: Option<Arc<dyn Ledger>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl CasinoServiceBuilder {
    pub fn new(config: CasinoConfig) -> Self {
        Self {
            config,
            accounts: None,
            ledger: None,
            metrics: None,
        }
    }

    pub fn with_accounts(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> CasinoResult<CasinoService> {
        let catalog = Arc::new(self.config.catalog()?);
        let processor = GameProcessor::new(
            self.config.house_policy(),
            self.config.bet_limits(),
            catalog,
        );

        Ok(CasinoService {
            accounts: self
                .accounts
                .unwrap_or_else(|| Arc::new(InMemoryAccountStore::new())),
            ledger: self.ledger.unwrap_or_else(|| Arc::new(InMemoryLedger::new())),
            processor,
            rounds: RoundRegistry::new(),
            vault: SeedVault::new(),
            audit: FairnessAudit::new(),
            unsettled: DashMap::new(),
            voided: DashSet::new(),
            wager_owners: DashMap::new(),
            player_locks: DashMap::new(),
            metrics: self.metrics.unwrap_or_default(),
            starting_balance: self.config.house.starting_balance,
            round_timeout: self.config.round_timeout(),
        })
    }
}
