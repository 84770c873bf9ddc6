//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism. They are the foundation the replay verifier stands on.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::{StateHash32, StateHasher, chain_fold};
