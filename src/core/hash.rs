//! State Hashing for Verification
//!
//! Two hashers live here, for two different jobs:
//!
//! - [`StateHasher`]: a fast 32-bit FNV-1a digest over an explicit,
//!   little-endian, order-stable serialization of the outcome-relevant
//!   state fields. This is what checkpoints and the hash chain are built
//!   from - it runs at every checkpoint tick, so it has to be cheap.
//! - SHA-256 (via `sha2`) for the cold path: config-snapshot digests and
//!   seed derivation, where collision resistance matters and speed does not.
//!
//! The serialization order is versioned by the domain string. Nothing fed
//! into a `StateHasher` may depend on unordered-container iteration or on
//! host floating-point.

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// 32-bit state digest, as carried in checkpoints.
pub type StateHash32 = u32;

/// SHA-256 output for config digests and seed material.
pub type Digest256 = [u8; 32];

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET: u32 = 2166136261;

/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 16777619;

/// Deterministic 32-bit hasher for simulation snapshots.
///
/// FNV-1a folded byte-by-byte over little-endian encodings.
/// Order of updates is critical: it IS the snapshot serialization.
#[derive(Clone, Debug)]
pub struct StateHasher {
    state: u32,
}

impl StateHasher {
    /// Create a new hasher seeded with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Self { state: FNV_OFFSET };
        hasher.update_bytes(domain);
        hasher
    }

    /// Create hasher for a game-state snapshot.
    pub fn for_snapshot() -> Self {
        Self::new(b"EMBERHOLD_STATE_V1")
    }

    /// Create hasher for a hash-chain link.
    pub fn for_chain() -> Self {
        Self::new(b"EMBERHOLD_CHAIN_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u32;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.update_bytes(&[value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.update_bytes(&value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.update_bytes(&value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.update_bytes(&value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.update_bytes(&value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.update_bytes(&value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.update_i32(value);
    }

    /// Update with a FixedVec2.
    #[inline]
    pub fn update_vec2(&mut self, value: FixedVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the 32-bit digest.
    pub fn finalize(self) -> StateHash32 {
        self.state
    }
}

/// Fold a snapshot hash into the running chain.
///
/// `chain_n = H(chain_{n-1}, hash_n)` - altering any earlier snapshot
/// changes every chain value from that point on, which is what lets the
/// verifier spot-check sparse audit ticks instead of every checkpoint.
#[inline]
pub fn chain_fold(prev_chain: StateHash32, hash: StateHash32) -> StateHash32 {
    let mut hasher = StateHasher::for_chain();
    hasher.update_u32(prev_chain);
    hasher.update_u32(hash);
    hasher.finalize()
}

/// Compute a SHA-256 digest with a domain separator.
///
/// Cold-path hashing: config snapshots, token binding material.
pub fn sha256_with_domain(domain: &[u8], data: &[u8]) -> Digest256 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// TESTS
// =============================================================================
