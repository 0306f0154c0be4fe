//! End-to-end wager flows through `CasinoService`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use luckbox::config::CasinoConfig;
use luckbox::errors::{CasinoError, StorageError};
use luckbox::fairness::verify_draws;
use luckbox::games::coinflip::CoinSide;
use luckbox::games::rounds::{RoundAction, RoundStateView};
use luckbox::games::tower::TowerDifficulty;
use luckbox::games::types::{GameParameters, OutcomeDetail, RoundParameters};
use luckbox::service::{
    CasinoService, CasinoServiceBuilder, RoundReply, RoundStartRequest, WagerRequest,
};
use luckbox::store::{
    AccountDelta, AccountStore, InMemoryAccountStore, InMemoryLedger, Ledger, LedgerRecord,
    PlayerAccount,
};

/// Ledger that can be switched offline
#[derive(Default)]
struct FlakyLedger {
    inner: InMemoryLedger,
    offline: AtomicBool,
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn append(&self, record: LedgerRecord) -> Result<bool, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("ledger offline".to_string()));
        }
        self.inner.append(record).await
    }

    async fn find(&self, wager_id: &str) -> Result<Option<LedgerRecord>, StorageError> {
        self.inner.find(wager_id).await
    }

    async fn history(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StorageError> {
        self.inner.history(player_id, limit).await
    }
}

/// Ledger whose appends take a while to land
#[derive(Default)]
struct SlowLedger {
    inner: InMemoryLedger,
}

#[async_trait]
impl Ledger for SlowLedger {
    async fn append(&self, record: LedgerRecord) -> Result<bool, StorageError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.append(record).await
    }

    async fn find(&self, wager_id: &str) -> Result<Option<LedgerRecord>, StorageError> {
        self.inner.find(wager_id).await
    }

    async fn history(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StorageError> {
        self.inner.history(player_id, limit).await
    }
}

/// Account store whose payout credits can be made to fail
#[derive(Default)]
struct FlakyAccounts {
    inner: InMemoryAccountStore,
    reject_payouts: AtomicBool,
}

#[async_trait]
impl AccountStore for FlakyAccounts {
    async fn get_player(&self, player_id: &str) -> Result<PlayerAccount, StorageError> {
        self.inner.get_player(player_id).await
    }

    async fn ensure_player(
        &self,
        player_id: &str,
        starting_balance: u64,
    ) -> Result<PlayerAccount, StorageError> {
        self.inner.ensure_player(player_id, starting_balance).await
    }

    async fn apply_delta(
        &self,
        player_id: &str,
        delta: &AccountDelta,
    ) -> Result<PlayerAccount, StorageError> {
        if self.reject_payouts.load(Ordering::SeqCst) && delta.op_id.ends_with(":payout") {
            return Err(StorageError::WriteFailed("account store timeout".to_string()));
        }
        self.inner.apply_delta(player_id, delta).await
    }
}

fn coinflip(player: &str, wager_id: &str, bet: u64) -> WagerRequest {
    WagerRequest {
        player_id: player.to_string(),
        wager_id: Some(wager_id.to_string()),
        bet_amount: bet,
        client_seed: Some(format!("client-{}", wager_id)),
        params: GameParameters::CoinFlip {
            choice: CoinSide::Tails,
        },
    }
}

fn mines(player: &str, wager_id: &str, bet: u64, count: u32) -> RoundStartRequest {
    RoundStartRequest {
        player_id: player.to_string(),
        wager_id: Some(wager_id.to_string()),
        bet_amount: bet,
        client_seed: None,
        params: RoundParameters::Mines { mines: count },
    }
}

async fn balance(service: &CasinoService, player: &str) -> u64 {
    service.player(player).await.unwrap().account.balance
}

#[tokio::test]
async fn test_replayed_wager_is_not_settled_twice() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_ledger(ledger.clone())
        .build()
        .unwrap();

    let first = service.play(coinflip("alice", "w-1", 200)).await.unwrap();
    let second = service.play(coinflip("alice", "w-1", 200)).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.fairness, second.fairness);
    assert_eq!(second.new_balance, first.new_balance);
    assert_eq!(balance(&service, "alice").await, 1_000 - 200 + first.outcome.payout);
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test]
async fn test_receipt_verifies_against_commitment() {
    let service = CasinoService::in_memory(&CasinoConfig::default()).unwrap();
    let published = service.commit_seed("carol");

    let receipt = service
        .play(WagerRequest {
            player_id: "carol".to_string(),
            wager_id: None,
            bet_amount: 300,
            client_seed: Some("lucky".to_string()),
            params: GameParameters::Case {
                case_id: "starter".to_string(),
                count: 3,
            },
        })
        .await
        .unwrap();

    assert_eq!(receipt.fairness.server_seed_hash, published);
    assert_eq!(receipt.fairness.client_seed, "lucky");
    // One fairness round per case opened
    assert_eq!(receipt.fairness.nonce, 2);
    assert!(verify_draws(&receipt.fairness, &receipt.outcome.raw_draws).is_valid());
}

#[tokio::test]
async fn test_invalid_wagers_have_no_side_effects() {
    let service = CasinoService::in_memory(&CasinoConfig::default()).unwrap();
    let rejected = [
        coinflip("dave", "w-0", 0),
        coinflip("dave", "w-big", 1_001),
        WagerRequest {
            params: GameParameters::Case {
                case_id: "missing".to_string(),
                count: 1,
            },
            ..coinflip("dave", "w-case", 100)
        },
        WagerRequest {
            params: GameParameters::Dice { chance_bps: 9_900 },
            ..coinflip("dave", "w-dice", 100)
        },
    ];

    for request in rejected {
        let err = service.play(request).await.unwrap_err();
        assert!(matches!(err, CasinoError::InvalidWager(_)), "unexpected {:?}", err);
    }
    let err = service.start_round(mines("dave", "r-1", 100, 25)).await.unwrap_err();
    assert!(matches!(err, CasinoError::InvalidWager(_)));

    let summary = service.player("dave").await.unwrap();
    assert_eq!(summary.account.balance, 1_000);
    assert_eq!(summary.account.xp, 0);
    assert!(summary.active_round.is_none());
    assert!(service.history("dave", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_failure_is_retried_with_same_wager_id() {
    let ledger = Arc::new(FlakyLedger::default());
    let service = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_ledger(ledger.clone())
        .build()
        .unwrap();

    ledger.offline.store(true, Ordering::SeqCst);
    let err = service.play(coinflip("erin", "w-7", 100)).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.outcome_determined());
    let determined = match err {
        CasinoError::PersistenceFailure { outcome: Some(outcome), .. } => *outcome,
        other => panic!("expected persistence failure, got {:?}", other),
    };
    assert_eq!(service.unsettled_count(), 1);

    ledger.offline.store(false, Ordering::SeqCst);
    let receipt = service.play(coinflip("erin", "w-7", 100)).await.unwrap();

    // Same outcome, credited once, recorded once
    assert_eq!(receipt.outcome, determined);
    assert_eq!(receipt.new_balance, 1_000 - 100 + determined.payout);
    assert_eq!(balance(&service, "erin").await, receipt.new_balance);
    assert_eq!(ledger.inner.len().await, 1);
    assert_eq!(service.unsettled_count(), 0);
}

#[tokio::test]
async fn test_housekeeping_settles_parked_payouts() {
    let accounts = Arc::new(FlakyAccounts::default());
    let service = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_accounts(accounts.clone())
        .build()
        .unwrap();

    accounts.reject_payouts.store(true, Ordering::SeqCst);
    let err = service.play(coinflip("frank", "w-3", 300)).await.unwrap_err();
    assert!(err.outcome_determined());
    assert_eq!(balance(&service, "frank").await, 700);
    assert_eq!(service.retry_unsettled().await, 0);

    accounts.reject_payouts.store(false, Ordering::SeqCst);
    assert_eq!(service.retry_unsettled().await, 1);
    assert_eq!(service.unsettled_count(), 0);

    let history = service.history("frank", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(balance(&service, "frank").await, 700 + history[0].payout);
    assert_eq!(history[0].balance_after, 700 + history[0].payout);
}

#[tokio::test]
async fn test_round_state_conflicts_leave_balance_alone() {
    let service = CasinoService::in_memory(&CasinoConfig::default()).unwrap();

    let view = service.start_round(mines("gina", "r-1", 100, 3)).await.unwrap();
    assert_eq!(view.round_id, "r-1");
    assert_eq!(balance(&service, "gina").await, 900);

    // Retried start answers with the open round
    let again = service.start_round(mines("gina", "r-1", 100, 3)).await.unwrap();
    assert_eq!(again.server_seed_hash, view.server_seed_hash);
    assert_eq!(balance(&service, "gina").await, 900);

    // Cash-out before any reveal
    let err = service.round_action("r-1", "gina", RoundAction::CashOut).await.unwrap_err();
    assert!(matches!(err, CasinoError::RoundStateConflict(_)));

    // Someone else's round
    let err = service.round_action("r-1", "hank", RoundAction::Reveal(0)).await.unwrap_err();
    assert!(matches!(err, CasinoError::RoundStateConflict(_)));

    // One open round per player
    let err = service.start_round(mines("gina", "r-2", 100, 3)).await.unwrap_err();
    assert!(matches!(err, CasinoError::RoundStateConflict(_)));

    assert_eq!(balance(&service, "gina").await, 900);
    assert!(service.player("gina").await.unwrap().active_round.is_some());
}

#[tokio::test]
async fn test_revealing_the_same_tile_twice_conflicts() {
    let service = CasinoService::in_memory(&CasinoConfig::default()).unwrap();

    // A single mine hides under tile 0 one time in 25; try a few rounds
    for attempt in 0..10 {
        let round_id = format!("r-{}", attempt);
        service.start_round(mines("ivy", &round_id, 10, 1)).await.unwrap();
        match service.round_action(&round_id, "ivy", RoundAction::Reveal(0)).await.unwrap() {
            RoundReply::Continue(view) => {
                let before = balance(&service, "ivy").await;
                let err = service
                    .round_action(&round_id, "ivy", RoundAction::Reveal(0))
                    .await
                    .unwrap_err();
                assert!(matches!(err, CasinoError::RoundStateConflict(_)));
                assert_eq!(balance(&service, "ivy").await, before);
                match view.state {
                    RoundStateView::Mines(mines) => assert_eq!(mines.revealed, vec![0]),
                    other => panic!("unexpected state {:?}", other),
                }
                return;
            }
            RoundReply::Settled(receipt) => assert!(!receipt.outcome.won),
        }
    }
    panic!("tile 0 held the mine in every round");
}

#[tokio::test]
async fn test_mines_round_settles_with_verifiable_layout() {
    let service = CasinoService::in_memory(&CasinoConfig::default()).unwrap();
    service.start_round(mines("jack", "r-m", 100, 5)).await.unwrap();

    let mut receipt = None;
    for tile in 0..3 {
        match service.round_action("r-m", "jack", RoundAction::Reveal(tile)).await.unwrap() {
            RoundReply::Continue(_) => {}
            RoundReply::Settled(settled) => {
                receipt = Some(settled);
                break;
            }
        }
    }
    let receipt = match receipt {
        Some(receipt) => receipt,
        None => match service.round_action("r-m", "jack", RoundAction::CashOut).await.unwrap() {
            RoundReply::Settled(receipt) => receipt,
            RoundReply::Continue(_) => panic!("cash-out must settle"),
        },
    };

    match &receipt.outcome.detail {
        OutcomeDetail::Mines { mines, layout, revealed } => {
            assert_eq!(*mines, 5);
            assert_eq!(layout.iter().filter(|m| **m).count(), 5);
            let hit = revealed.iter().any(|t| layout[*t as usize]);
            assert_eq!(receipt.outcome.won, !hit);
            if receipt.outcome.won {
                // Three safe reveals with five mines pay 1.95x
                assert_eq!(revealed.len(), 3);
                assert_eq!(receipt.outcome.payout, 195);
            }
        }
        other => panic!("unexpected detail {:?}", other),
    }
    assert!(verify_draws(&receipt.fairness, &receipt.outcome.raw_draws).is_valid());
    assert_eq!(receipt.new_balance, 900 + receipt.outcome.payout);
    assert!(service.player("jack").await.unwrap().active_round.is_none());

    // The round is gone once settled
    let err = service.round_action("r-m", "jack", RoundAction::CashOut).await.unwrap_err();
    assert!(matches!(err, CasinoError::RoundStateConflict(_)));
}

#[tokio::test]
async fn test_idle_rounds_are_forfeited() {
    let mut config = CasinoConfig::default();
    config.rounds.round_timeout_secs = 0;
    let service = CasinoService::in_memory(&config).unwrap();

    service
        .start_round(RoundStartRequest {
            player_id: "kim".to_string(),
            wager_id: Some("r-t".to_string()),
            bet_amount: 50,
            client_seed: None,
            params: RoundParameters::Tower {
                difficulty: TowerDifficulty::Medium,
            },
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(service.sweep_expired_rounds().await, 1);

    let history = service.history("kim", 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payout, 0);
    assert_eq!(balance(&service, "kim").await, 950);
    assert!(service.player("kim").await.unwrap().active_round.is_none());
}

#[tokio::test]
async fn test_concurrent_wagers_never_overdraw() {
    let service = Arc::new(CasinoService::in_memory(&CasinoConfig::default()).unwrap());

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .play(coinflip("lee", &format!("w-{}", i), 100))
                    .await
            })
        })
        .collect();

    let mut profit = 0i64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => profit += receipt.outcome.profit,
            Err(CasinoError::InvalidWager(_)) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(balance(&service, "lee").await as i64, 1_000 + profit);
}

#[tokio::test]
async fn test_shared_wager_id_is_claimed_by_one_player() {
    let ledger = Arc::new(SlowLedger::default());
    let service = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_ledger(ledger.clone())
        .build()
        .unwrap();

    let (alice, mallory) = tokio::join!(
        service.play(coinflip("alice", "shared", 100)),
        service.play(coinflip("mallory", "shared", 100)),
    );

    let (winner, loser, err) = match (alice, mallory) {
        (Ok(receipt), Err(err)) => (receipt, "mallory", err),
        (Err(err), Ok(receipt)) => (receipt, "alice", err),
        other => panic!("expected exactly one settled wager, got {:?}", other),
    };
    assert!(matches!(err, CasinoError::InvalidWager(_)), "unexpected {:?}", err);

    assert_eq!(balance(&service, loser).await, 1_000);
    assert!(service.history(loser, 10).await.unwrap().is_empty());
    let records = service.history(&winner.player_id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].wager_id, "shared");
    assert_eq!(ledger.inner.len().await, 1);
    assert_eq!(service.unsettled_count(), 0);
}

#[tokio::test]
async fn test_ledger_held_by_another_player_is_not_settled() {
    // Two nodes sharing one ledger but not their claim tables
    let ledger = Arc::new(SlowLedger::default());
    let first = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_ledger(ledger.clone())
        .build()
        .unwrap();
    let second = CasinoServiceBuilder::new(CasinoConfig::default())
        .with_ledger(ledger.clone())
        .build()
        .unwrap();

    let (a, b) = tokio::join!(
        first.play(coinflip("alice", "shared", 100)),
        second.play(coinflip("mallory", "shared", 100)),
    );

    let (recorded, parked) = match (&a, &b) {
        (Ok(receipt), Err(err)) => (receipt, (&second, err)),
        (Err(err), Ok(receipt)) => (receipt, (&first, err)),
        other => panic!("expected exactly one recorded wager, got {:?}", other),
    };
    let (parked_service, err) = parked;
    assert!(
        matches!(err, CasinoError::PersistenceFailure { outcome: Some(_), .. }),
        "unexpected {:?}",
        err
    );
    assert_eq!(parked_service.unsettled_count(), 1);

    let held = ledger.inner.find("shared").await.unwrap().unwrap();
    assert_eq!(held.player_id, recorded.player_id);
    assert_eq!(ledger.inner.len().await, 1);
}
