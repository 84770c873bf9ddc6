//! # Emberhold Engine
//!
//! Deterministic session simulation and replay verification for Emberhold,
//! the anti-cheat and scoring core behind session rewards.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EMBERHOLD ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - 32-bit snapshot hashing + chain fold      │
//! │                                                              │
//! │  sim/            - Game logic (deterministic)                │
//! │  ├── config.rs   - Versioned config snapshots                │
//! │  ├── state.rs    - Session state and entities                │
//! │  ├── relic.rs    - Relic catalog and derived modifiers       │
//! │  ├── wave.rs     - Campaign wave machinery                   │
//! │  ├── combat.rs   - Combat resolution                         │
//! │  ├── events.rs   - Player-intent events (validate/apply)     │
//! │  ├── step.rs     - Authoritative one-tick stepper            │
//! │  └── bossrush.rs - Endless boss gauntlet sub-simulation      │
//! │                                                              │
//! │  verify/         - Server-side session verification          │
//! │  ├── checkpoint.rs - Hash-chain checkpoints                  │
//! │  ├── session.rs  - Boundary types and rejection taxonomy     │
//! │  ├── replay.rs   - Replay orchestrator (campaign)            │
//! │  └── summary.rs  - Bounds validator (boss rush)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `sim/` modules are **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No HashMap (BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from one seeded Xorshift128+ stream, drawn in a
//!   fixed, content-independent order
//!
//! Given the same seed, config snapshot and event log, the simulation
//! produces **identical state, checkpoints and final hash** on any
//! platform - which is exactly what the replay verifier relies on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod sim;
pub mod verify;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use crate::core::vec2::FixedVec2;
pub use crate::core::rng::DeterministicRng;
pub use sim::{ConfigSnapshot, GameState, GameMode, PlayerEvent, EventKind};
pub use verify::{
    SessionToken, SessionSubmission, VerificationResult, VerificationReport,
    RejectReason, verify_session,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation version. Submissions built against any other value are
/// rejected before replay.
pub const SIM_VERSION: u16 = 3;

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 30;
