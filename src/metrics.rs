//! Wager metrics, exported in Prometheus text format

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::games::types::ResolutionOutcome;

/// Prometheus-compatible counters for the wagering core
pub struct MetricsRegistry {
    start_time: Instant,
    pub wagers_total: AtomicU64,
    pub wagers_won: AtomicU64,
    pub coins_wagered: AtomicU64,
    pub coins_paid: AtomicU64,
    pub wagers_rejected: AtomicU64,
    pub wagers_replayed: AtomicU64,
    pub persistence_failures: AtomicU64,
    pub rounds_started: AtomicU64,
    pub rounds_expired: AtomicU64,
    pub active_rounds: AtomicU64,
    pub http_requests_total: AtomicU64,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            wagers_total: AtomicU64::new(0),
            wagers_won: AtomicU64::new(0),
            coins_wagered: AtomicU64::new(0),
            coins_paid: AtomicU64::new(0),
            wagers_rejected: AtomicU64::new(0),
            wagers_replayed: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_expired: AtomicU64::new(0),
            active_rounds: AtomicU64::new(0),
            http_requests_total: AtomicU64::new(0),
        }
    }

    /// Record a settled wager
    pub fn record_settled(&self, outcome: &ResolutionOutcome) {
        self.wagers_total.fetch_add(1, Ordering::Relaxed);
        if outcome.won {
            self.wagers_won.fetch_add(1, Ordering::Relaxed);
        }
        self.coins_wagered.fetch_add(outcome.bet_amount, Ordering::Relaxed);
        self.coins_paid.fetch_add(outcome.payout, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.wagers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replayed(&self) {
        self.wagers_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_expired(&self) {
        self.rounds_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_rounds(&self, count: usize) {
        self.active_rounds.store(count as u64, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Observed return-to-player across all settled wagers
    pub fn observed_rtp(&self) -> f64 {
        let wagered = self.coins_wagered.load(Ordering::Relaxed);
        if wagered == 0 {
            return 0.0;
        }
        self.coins_paid.load(Ordering::Relaxed) as f64 / wagered as f64
    }

    /// Generate Prometheus metrics format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();
        let counters: [(&str, &str, &AtomicU64); 10] = [
            ("luckbox_wagers_total", "Settled wagers", &self.wagers_total),
            ("luckbox_wagers_won_total", "Settled wagers with a payout", &self.wagers_won),
            ("luckbox_coins_wagered_total", "Coins staked on settled wagers", &self.coins_wagered),
            ("luckbox_coins_paid_total", "Coins paid out on settled wagers", &self.coins_paid),
            (
                "luckbox_wagers_rejected_total",
                "Wagers rejected before any draw",
                &self.wagers_rejected,
            ),
            (
                "luckbox_wagers_replayed_total",
                "Retried wagers answered from the ledger",
                &self.wagers_replayed,
            ),
            (
                "luckbox_persistence_failures_total",
                "Account store or ledger writes that failed",
                &self.persistence_failures,
            ),
            ("luckbox_rounds_started_total", "Interactive rounds started", &self.rounds_started),
            (
                "luckbox_rounds_expired_total",
                "Interactive rounds forfeited by expiry",
                &self.rounds_expired,
            ),
            (
                "luckbox_http_requests_total",
                "Total number of HTTP requests",
                &self.http_requests_total,
            ),
        ];

        for (name, help, value) in counters {
            let _ = write!(
                output,
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n\n",
                value.load(Ordering::Relaxed)
            );
        }

        let _ = write!(
            output,
            "# HELP luckbox_active_rounds Interactive rounds awaiting the player\n\
             # TYPE luckbox_active_rounds gauge\n\
             luckbox_active_rounds {}\n\n",
            self.active_rounds.load(Ordering::Relaxed)
        );
        let _ = write!(
            output,
            "# HELP luckbox_observed_rtp Coins paid per coin wagered\n\
             # TYPE luckbox_observed_rtp gauge\n\
             luckbox_observed_rtp {:.6}\n\n",
            self.observed_rtp()
        );
        let _ = write!(
            output,
            "# HELP luckbox_uptime_seconds Seconds since start\n\
             # TYPE luckbox_uptime_seconds gauge\n\
             luckbox_uptime_seconds {}\n",
            self.uptime().as_secs()
        );

        output
    }
}
