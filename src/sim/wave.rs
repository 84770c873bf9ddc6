//! Campaign Wave Machinery
//!
//! Rolls wave composition, feeds the spawn queue, detects wave clear and
//! offers the relic choice. Composition is always rolled before any loot
//! roll of the same wave - the draw order is part of the replay contract.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{fixed_pow_i64, scale_i64};
use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;
use crate::sim::config::ConfigSnapshot;
use crate::sim::relic::{RelicChoice, roll_relic_options};
use crate::sim::state::{EnemyKind, GameState, ModeState};

/// Where the current wave is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavePhase {
    /// Between waves; the next one starts at the given tick.
    Break {
        /// Tick the next wave begins.
        next_wave_at: u32,
    },
    /// Spawning the rolled composition, one enemy per interval.
    Spawning {
        /// Composition rolled at wave start, in spawn order.
        queue: Vec<EnemyKind>,
        /// How many of the queue have spawned (also the gate slot).
        spawned: u32,
        /// Tick of the next spawn.
        next_spawn_at: u32,
    },
    /// Queue exhausted; waiting for the field to empty.
    Clearing,
    /// Wave cleared; progression blocked until the relic choice resolves.
    AwaitingChoice,
}

/// Campaign sub-state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveState {
    /// Index of the wave being fought (or about to start).
    pub wave: u32,
    /// Waves fully cleared so far.
    pub waves_cleared: u32,
    /// Lifecycle phase.
    pub phase: WavePhase,
}

/// Grace period before the first wave, in ticks.
const FIRST_WAVE_DELAY: u32 = 30;

impl WaveState {
    /// Campaign start: wave 0 begins after a short grace period.
    pub fn new() -> Self {
        Self {
            wave: 0,
            waves_cleared: 0,
            phase: WavePhase::Break { next_wave_at: FIRST_WAVE_DELAY },
        }
    }

    /// Resolve the pending relic choice: advance to the next wave after
    /// the intermission. Called from event application only.
    pub fn advance_after_choice(&mut self, tick: u32, config: &ConfigSnapshot) {
        self.wave += 1;
        self.phase = WavePhase::Break {
            next_wave_at: tick + config.intermission_ticks,
        };
    }

    /// Hash the wave machinery into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.wave);
        hasher.update_u32(self.waves_cleared);
        match &self.phase {
            WavePhase::Break { next_wave_at } => {
                hasher.update_u8(0);
                hasher.update_u32(*next_wave_at);
            }
            WavePhase::Spawning { queue, spawned, next_spawn_at } => {
                hasher.update_u8(1);
                hasher.update_u32(queue.len() as u32);
                for kind in queue {
                    hasher.update_u8(*kind as u8);
                }
                hasher.update_u32(*spawned);
                hasher.update_u32(*next_spawn_at);
            }
            WavePhase::Clearing => hasher.update_u8(2),
            WavePhase::AwaitingChoice => hasher.update_u8(3),
        }
    }
}

impl Default for WaveState {
    fn default() -> Self {
        Self::new()
    }
}

/// Roll the enemy composition of a wave.
///
/// One weighted kind roll per slot, in slot order.
pub fn roll_composition(rng: &mut DeterministicRng, config: &ConfigSnapshot, wave: u32) -> Vec<EnemyKind> {
    let count = config.base_wave_enemies + wave * config.enemies_per_wave;
    let mut queue = Vec::with_capacity(count as usize);

    for _ in 0..count {
        // Weighted distribution: Grunt 50%, Runner 25%, Brute 15%, Warlock 10%
        let roll = rng.next_int(100);
        let kind = if roll < 50 {
            EnemyKind::Grunt
        } else if roll < 75 {
            EnemyKind::Runner
        } else if roll < 90 {
            EnemyKind::Brute
        } else {
            EnemyKind::Warlock
        };
        queue.push(kind);
    }

    queue
}

/// Advance the campaign wave machinery by one tick.
///
/// Runs after combat resolution, so "field empty" reflects this tick's
/// kills. Offers the relic choice when a wave clears (loot roll - always
/// after the composition roll that opened the wave).
pub fn process_waves(state: &mut GameState, config: &ConfigSnapshot) {
    let phase = match &state.mode {
        ModeState::Campaign(ws) => ws.phase.clone(),
        ModeState::BossRush(_) => return,
    };

    match phase {
        WavePhase::Break { next_wave_at } => {
            if state.tick >= next_wave_at {
                let wave = campaign(state).wave;
                let queue = roll_composition(&mut state.rng, config, wave);
                if queue.is_empty() {
                    campaign(state).phase = WavePhase::Clearing;
                } else {
                    let next_spawn_at = state.tick;
                    campaign(state).phase = WavePhase::Spawning { queue, spawned: 0, next_spawn_at };
                }
            }
        }
        WavePhase::Spawning { queue, spawned, next_spawn_at } => {
            if state.tick >= next_spawn_at {
                let wave = campaign(state).wave;
                let kind = queue[spawned as usize];

                let hp_growth = fixed_pow_i64(config.enemy_hp_growth, wave);
                let dmg_growth = fixed_pow_i64(config.enemy_damage_growth, wave);
                let hp = scale_i64(kind.base_hp(), hp_growth).max(1);
                let damage = scale_i64(kind.base_damage(), dmg_growth).max(1);
                let bounty = kind.base_bounty() + wave as i64;

                state.spawn_enemy(kind, spawned, hp, damage, bounty);

                let spawned = spawned + 1;
                if (spawned as usize) >= queue.len() {
                    campaign(state).phase = WavePhase::Clearing;
                } else {
                    let next_spawn_at = state.tick + config.spawn_interval_ticks;
                    campaign(state).phase = WavePhase::Spawning { queue, spawned, next_spawn_at };
                }
            }
        }
        WavePhase::Clearing => {
            if state.enemies.is_empty() {
                // Wave rewards accrue explicitly, never as a side effect
                state.resources.dust_earned += config.wave_clear_dust;
                state.score += config.wave_clear_score;

                let wave = campaign(state).wave;
                let options = roll_relic_options(&mut state.rng, &state.relics, config.relic_options);
                state.pending_choice = Some(RelicChoice {
                    wave,
                    options,
                    offered_tick: state.tick,
                    rerolls_used: 0,
                });

                let ws = campaign(state);
                ws.waves_cleared += 1;
                ws.phase = WavePhase::AwaitingChoice;
            }
        }
        WavePhase::AwaitingChoice => {
            // Blocked until the choice event resolves
        }
    }
}

/// Access the campaign sub-state. Only called on campaign sessions.
fn campaign(state: &mut GameState) -> &mut WaveState {
    match &mut state.mode {
        ModeState::Campaign(ws) => ws,
        ModeState::BossRush(_) => unreachable!("campaign accessor on boss-rush state"),
    }
}

// =============================================================================
// TESTS
// =============================================================================
