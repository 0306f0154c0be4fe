//! Luckbox - provably fair wagering core
//!
//! Every wager is resolved from a committed server seed, a client seed and a
//! nonce, then settled through idempotent account and ledger writes.

pub mod api;
pub mod config;
pub mod errors;
pub mod fairness;
pub mod games;
pub mod metrics;
pub mod service;
pub mod store;

pub use errors::{CasinoError, CasinoResult};
pub use service::{CasinoService, CasinoServiceBuilder, WagerReceipt, WagerRequest};
