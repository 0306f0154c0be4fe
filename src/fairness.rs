//! Provably fair randomness: server seed commitment, client seed mixing and
//! an auditable stream of draws.
//!
//! Every value is `sha256("{server_seed}:{client_seed}:{nonce}:{draw_index}")`
//! truncated to its first 4 bytes and scaled into `[0, 1)`. The hash of the
//! server seed is published before a wager resolves and the seed itself only
//! afterwards, so players can recompute every draw.

use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{CasinoError, CasinoResult};

const SERVER_SEED_BYTES: usize = 32;
const DRAW_SCALE: f64 = 4_294_967_296.0; // 2^32

/// Hex-encoded SHA-256 of arbitrary input.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Derive one uniform value in `[0, 1)` from the full fairness tuple.
pub fn derive_uniform(server_seed: &str, client_seed: &str, nonce: u64, draw_index: u64) -> f64 {
    let message = format!("{}:{}:{}:{}", server_seed, client_seed, nonce, draw_index);
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    let digest = hasher.finalize();
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix as f64 / DRAW_SCALE
}

/// Map a uniform value onto an inclusive integer range.
pub fn scale_to_range(value: f64, min: u64, max: u64) -> u64 {
    debug_assert!(min <= max);
    let span = (max - min + 1) as f64;
    let offset = (value * span).floor() as u64;
    // value < 1 keeps offset < span; the min() guards float rounding at the edge
    min + offset.min(max - min)
}

/// Source of uniform draws consumed by the game resolvers.
pub trait RandomSource {
    /// Next value in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    /// Next integer in `[min, max]` inclusive.
    fn next_int(&mut self, min: u64, max: u64) -> u64 {
        let value = self.next_uniform();
        scale_to_range(value, min, max)
    }

    /// Move to the next round; sources without rounds ignore this.
    fn advance_round(&mut self) {}
}

/// A freshly generated, not yet disclosed server seed.
#[derive(Clone)]
pub struct ServerCommitment {
    server_seed: String,
    server_seed_hash: String,
}

impl ServerCommitment {
    /// Generate a new secret seed from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SERVER_SEED_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_secret(hex::encode(bytes))
    }

    /// Rebuild a commitment from a known seed (verification and tests).
    pub fn from_secret(server_seed: impl Into<String>) -> Self {
        let server_seed = server_seed.into();
        let server_seed_hash = sha256_hex(server_seed.as_bytes());
        Self {
            server_seed,
            server_seed_hash,
        }
    }

    pub fn server_seed_hash(&self) -> &str {
        &self.server_seed_hash
    }
}

impl std::fmt::Debug for ServerCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCommitment")
            .field("server_seed_hash", &self.server_seed_hash)
            .finish_non_exhaustive()
    }
}

/// One consumed draw, kept for the Resolution Outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Draw {
    pub nonce: u64,
    pub index: u64,
    pub value: f64,
}

/// Everything a player needs to recompute the draws of a resolved wager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FairnessReveal {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    /// Last nonce used under this server seed
    pub nonce: u64,
}

/// Committed draw stream for one wager.
///
/// There is no way to replace the server seed or client seed once the engine
/// exists, and `reveal` consumes the engine so nothing can be drawn after the
/// seed is disclosed.
pub struct FairnessEngine {
    commitment: ServerCommitment,
    client_seed: String,
    nonce: u64,
    draw_index: u64,
    consumed: Vec<Draw>,
}

impl FairnessEngine {
    /// Generate a new server seed and bind it to `client_seed`.
    pub fn commit(client_seed: impl Into<String>) -> Self {
        Self::begin(ServerCommitment::generate(), client_seed)
    }

    /// Bind a previously published commitment to `client_seed`.
    pub fn begin(commitment: ServerCommitment, client_seed: impl Into<String>) -> Self {
        Self {
            commitment,
            client_seed: client_seed.into(),
            nonce: 0,
            draw_index: 0,
            consumed: Vec::new(),
        }
    }

    pub fn server_seed_hash(&self) -> &str {
        self.commitment.server_seed_hash()
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn draw_index(&self) -> u64 {
        self.draw_index
    }

    /// Draws consumed so far, in order.
    pub fn consumed(&self) -> &[Draw] {
        &self.consumed
    }

    /// Disclose the server seed. Consumes the engine.
    pub fn reveal(self) -> FairnessReveal {
        FairnessReveal {
            server_seed: self.commitment.server_seed,
            server_seed_hash: self.commitment.server_seed_hash,
            client_seed: self.client_seed,
            nonce: self.nonce,
        }
    }
}

impl RandomSource for FairnessEngine {
    fn next_uniform(&mut self) -> f64 {
        let value = derive_uniform(
            &self.commitment.server_seed,
            &self.client_seed,
            self.nonce,
            self.draw_index,
        );
        self.consumed.push(Draw {
            nonce: self.nonce,
            index: self.draw_index,
            value,
        });
        self.draw_index += 1;
        value
    }

    /// Start the next round under the same server seed.
    fn advance_round(&mut self) {
        self.nonce += 1;
        self.draw_index = 0;
    }
}

/// Result of checking a reveal against published draws.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub commitment_matches: bool,
    pub draws_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_mismatch: Option<u64>,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.commitment_matches && self.draws_match
    }
}

/// Recompute every draw of a resolved wager from its reveal.
pub fn verify_draws(reveal: &FairnessReveal, draws: &[Draw]) -> Verification {
    let commitment_matches = sha256_hex(reveal.server_seed.as_bytes()) == reveal.server_seed_hash;

    let first_mismatch = draws.iter().position(|draw| {
        let expected =
            derive_uniform(&reveal.server_seed, &reveal.client_seed, draw.nonce, draw.index);
        expected != draw.value
    });

    Verification {
        commitment_matches,
        draws_match: first_mismatch.is_none(),
        first_mismatch: first_mismatch.map(|i| i as u64),
    }
}

/// Tracks which wager consumed each (server seed hash, nonce) pair.
#[derive(Default)]
pub struct FairnessAudit {
    rounds: DashMap<(String, u64), String>,
}

impl FairnessAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every nonce `0..=last_nonce` of `server_seed_hash` for `wager_id`.
    /// Claiming again for the same wager is a no-op.
    pub fn claim(
        &self,
        server_seed_hash: &str,
        last_nonce: u64,
        wager_id: &str,
    ) -> CasinoResult<()> {
        for nonce in 0..=last_nonce {
            let key = (server_seed_hash.to_string(), nonce);
            let owner = self
                .rounds
                .entry(key)
                .or_insert_with(|| wager_id.to_string());
            if owner.value() != wager_id {
                tracing::error!(
                    server_seed_hash,
                    nonce,
                    wager_id,
                    previous = owner.value().as_str(),
                    "fairness round reused"
                );
                return Err(CasinoError::FairnessViolation(format!(
                    "nonce {} of server seed {} already resolved wager {}",
                    nonce,
                    server_seed_hash,
                    owner.value()
                )));
            }
        }
        Ok(())
    }

    pub fn claimed_rounds(&self) -> usize {
        self.rounds.len()
    }
}

/// Server seeds committed ahead of each player's next wager.
///
/// The hash handed out by [`SeedVault::peek`] is the one the next wager is
/// resolved under; taking it immediately commits a replacement.
#[derive(Default)]
pub struct SeedVault {
    pending: DashMap<String, ServerCommitment>,
}

impl SeedVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the seed the player's next wager will use.
    pub fn peek(&self, player_id: &str) -> String {
        self.pending
            .entry(player_id.to_string())
            .or_insert_with(ServerCommitment::generate)
            .server_seed_hash()
            .to_string()
    }

    /// Hand out the committed seed for a wager and commit the next one.
    /// Returns the seed and the hash of its successor.
    pub fn take(&self, player_id: &str) -> (ServerCommitment, String) {
        let next = ServerCommitment::generate();
        let next_hash = next.server_seed_hash().to_string();
        let current = self
            .pending
            .insert(player_id.to_string(), next)
            .unwrap_or_else(ServerCommitment::generate);
        (current, next_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_uniform("server", "client", 3, 7);
        let b = derive_uniform("server", "client", 3, 7);
        assert_eq!(a, b);
        assert!((0.0..1.0).contains(&a));
        assert_ne!(a, derive_uniform("server", "client", 3, 8));
        assert_ne!(a, derive_uniform("server", "client", 4, 7));
        assert_ne!(a, derive_uniform("server", "other", 3, 7));
    }

    #[test]
    fn test_engine_matches_derivation() {
        let commitment = ServerCommitment::from_secret("fixed-seed");
        let mut engine = FairnessEngine::begin(commitment, "player-seed");

        let first = engine.next_uniform();
        let second = engine.next_uniform();
        engine.advance_round();
        let third = engine.next_uniform();

        assert_eq!(first, derive_uniform("fixed-seed", "player-seed", 0, 0));
        assert_eq!(second, derive_uniform("fixed-seed", "player-seed", 0, 1));
        assert_eq!(third, derive_uniform("fixed-seed", "player-seed", 1, 0));
        assert_eq!(engine.consumed().len(), 3);
        assert_eq!(engine.draw_index(), 1);
    }

    #[test]
    fn test_next_int_bounds() {
        let mut engine = FairnessEngine::commit("bounds");
        for _ in 0..1_000 {
            let v = engine.next_int(1, 6);
            assert!((1..=6).contains(&v));
        }
        assert_eq!(scale_to_range(0.0, 0, 36), 0);
        assert_eq!(scale_to_range(0.999_999_999, 0, 36), 36);
    }

    #[test]
    fn test_reveal_verifies() {
        let mut engine = FairnessEngine::commit("verify-me");
        let published_hash = engine.server_seed_hash().to_string();
        for _ in 0..4 {
            engine.next_uniform();
        }
        engine.advance_round();
        engine.next_uniform();
        let draws = engine.consumed().to_vec();
        let reveal = engine.reveal();

        assert_eq!(reveal.server_seed_hash, published_hash);
        assert_eq!(reveal.nonce, 1);
        assert!(verify_draws(&reveal, &draws).is_valid());
    }

    #[test]
    fn test_tampered_draw_detected() {
        let mut engine = FairnessEngine::commit("tamper");
        engine.next_uniform();
        engine.next_uniform();
        let mut draws = engine.consumed().to_vec();
        let reveal = engine.reveal();

        draws[1].value = 0.5;
        let verification = verify_draws(&reveal, &draws);
        assert!(verification.commitment_matches);
        assert!(!verification.draws_match);
        assert_eq!(verification.first_mismatch, Some(1));

        let mut forged = reveal.clone();
        forged.server_seed = "another-seed".to_string();
        assert!(!verify_draws(&forged, &[]).commitment_matches);
    }

    #[test]
    fn test_audit_rejects_reuse() {
        let audit = FairnessAudit::new();
        audit.claim("hash-a", 2, "wager-1").unwrap();
        // Retried claim for the same wager is fine
        audit.claim("hash-a", 2, "wager-1").unwrap();
        assert_eq!(audit.claimed_rounds(), 3);

        let err = audit.claim("hash-a", 0, "wager-2").unwrap_err();
        assert!(matches!(err, CasinoError::FairnessViolation(_)));
        audit.claim("hash-b", 0, "wager-2").unwrap();
    }

    #[test]
    fn test_vault_uses_published_seed() {
        let vault = SeedVault::new();
        let published = vault.peek("alice");
        assert_eq!(vault.peek("alice"), published);

        let (commitment, next_hash) = vault.take("alice");
        assert_eq!(commitment.server_seed_hash(), published);
        assert_ne!(next_hash, published);
        assert_eq!(vault.peek("alice"), next_hash);
    }

    #[test]
    fn test_commitments_are_unique() {
        let a = ServerCommitment::generate();
        let b = ServerCommitment::generate();
        assert_ne!(a.server_seed_hash(), b.server_seed_hash());
        assert_eq!(a.server_seed_hash().len(), 64);
    }
}
