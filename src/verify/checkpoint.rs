//! Checkpoints and the Hash Chain
//!
//! A checkpoint is a `(tick, hash32, chainHash32)` triple. The snapshot
//! hash digests the outcome-relevant state; the chain hash folds in the
//! previous chain value, so altering any earlier tick invalidates every
//! later checkpoint. Clients produce these during play; the server
//! re-derives them during replay and never trusts the submitted copies.

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash32, chain_fold};
use crate::sim::config::ConfigSnapshot;
use crate::sim::state::GameState;

/// A tamper-evident digest of state at one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Tick the snapshot was taken at.
    pub tick: u32,
    /// 32-bit snapshot hash.
    pub hash: StateHash32,
    /// Chain hash: folds the previous checkpoint's chain value.
    pub chain: StateHash32,
}

/// Emit the scheduled checkpoint for the current tick, advancing the
/// state's chain register. Call exactly once per checkpoint tick.
pub fn emit_checkpoint(state: &mut GameState) -> Checkpoint {
    let hash = state.compute_hash();
    let chain = chain_fold(state.chain, hash);
    state.chain = chain;

    Checkpoint {
        tick: state.tick,
        hash,
        chain,
    }
}

/// Compute the final-tick checkpoint without advancing the register.
///
/// Sessions may end off the checkpoint schedule (defeat mid-interval), so
/// the final digest is computed the same way by client and verifier but
/// is not part of the periodic chain.
pub fn final_checkpoint(state: &GameState) -> Checkpoint {
    let hash = state.compute_hash();
    Checkpoint {
        tick: state.tick,
        hash,
        chain: chain_fold(state.chain, hash),
    }
}

/// An append-only checkpoint recording, as kept by the client during play
/// and uploaded at session end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointLog {
    /// Checkpoints in emission order (ticks strictly increasing).
    pub checkpoints: Vec<Checkpoint>,
}

impl CheckpointLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an emitted checkpoint.
    pub fn push(&mut self, checkpoint: Checkpoint) {
        self.checkpoints.push(checkpoint);
    }

    /// Find the checkpoint at an exact tick, if present.
    ///
    /// Binary search - the log is ordered by construction.
    pub fn find(&self, tick: u32) -> Option<&Checkpoint> {
        self.checkpoints
            .binary_search_by_key(&tick, |c| c.tick)
            .ok()
            .map(|idx| &self.checkpoints[idx])
    }

    /// Whether checkpoint ticks are strictly increasing.
    pub fn ticks_strictly_increasing(&self) -> bool {
        self.checkpoints.windows(2).all(|pair| pair[0].tick < pair[1].tick)
    }

    /// Number of recorded checkpoints.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Encode to the compact binary upload format.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Plain structs with fixed-width fields; bincode cannot fail here
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decode from the compact binary upload format.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::deserialize(bytes).ok()
    }

    /// Encoded size in bytes, for payload-ceiling checks.
    pub fn encoded_size(&self) -> u64 {
        bincode::serialized_size(self).unwrap_or(u64::MAX)
    }
}

/// Replay-side helper: whether `tick` should emit a checkpoint under the
/// given config. Mirrors the client schedule exactly.
#[inline]
pub fn is_scheduled(tick: u32, config: &ConfigSnapshot) -> bool {
    config.is_checkpoint_tick(tick)
}

// =============================================================================
// TESTS
// =============================================================================
