//! Simulation Module
//!
//! All game logic. 100% deterministic: fixed-point math, BTreeMap
//! iteration, one seeded RNG stream, no system time.
//!
//! ## Module Structure
//!
//! - `config`: immutable, versioned session tunables
//! - `state`: the game-state aggregate and entities
//! - `relic`: relic catalog, choices, derived modifiers
//! - `wave`: campaign wave composition and lifecycle
//! - `combat`: enemy advance, defender attacks, fortress damage
//! - `events`: player-intent events with validate/apply
//! - `step`: the authoritative one-tick stepper
//! - `bossrush`: the endless boss gauntlet sub-simulation

pub mod config;
pub mod state;
pub mod relic;
pub mod wave;
pub mod combat;
pub mod events;
pub mod step;
pub mod bossrush;

// Re-export key types
pub use config::ConfigSnapshot;
pub use state::{GameState, GameMode, GamePhase, ModeState};
pub use relic::{RelicId, RelicChoice, Modifiers};
pub use events::{PlayerEvent, EventKind, EventError};
pub use step::{step, StepOutcome};
pub use bossrush::BossRushState;
