//! Config Snapshot
//!
//! An immutable, versioned set of tunables captured at session start and
//! carried through replay. Later balance patches never invalidate old
//! sessions: the verifier replays with the snapshot the session was issued
//! under, and a version mismatch is an automatic rejection before any
//! simulation work.
//!
//! Positions, ranges and multipliers are Q16.16 `Fixed`; hit-point pools
//! and currency amounts are plain `i64` so long boss-rush runs cannot
//! overflow the 16-bit integer range of Q16.16.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::core::fixed::{Fixed, to_fixed};
use crate::core::hash::Digest256;

/// Config layout version. Bump whenever a field is added, removed or
/// reinterpreted - old sessions then fail the version gate instead of
/// silently replaying under the wrong rules.
pub const CONFIG_VERSION: u32 = 3;

/// Immutable tunables for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Layout version tag (see [`CONFIG_VERSION`]).
    pub version: u32,

    // =========================================================================
    // Timing
    // =========================================================================
    /// Simulation rate in ticks per second.
    pub tick_rate: u32,

    /// Ticks between checkpoints. Audit ticks are chosen from multiples
    /// of this interval.
    pub checkpoint_interval: u32,

    /// Hard ceiling on replayable session length, in ticks. Bounds the
    /// CPU cost of replaying an adversarial submission.
    pub max_session_ticks: u32,

    /// Length of the pause between a relic choice resolving and the next
    /// combat segment starting.
    pub intermission_ticks: u32,

    // =========================================================================
    // Relic choices
    // =========================================================================
    /// Number of relic options offered per choice.
    pub relic_options: u32,

    /// Dust cost of rerolling an offered option set.
    pub reroll_cost_dust: i64,

    // =========================================================================
    // Campaign waves
    // =========================================================================
    /// Enemy count of wave 0.
    pub base_wave_enemies: u32,

    /// Additional enemies per wave index.
    pub enemies_per_wave: u32,

    /// Ticks between individual enemy spawns within a wave.
    pub spawn_interval_ticks: u32,

    /// Per-wave multiplier on enemy hit points (Q16.16).
    pub enemy_hp_growth: Fixed,

    /// Per-wave multiplier on enemy contact damage (Q16.16).
    pub enemy_damage_growth: Fixed,

    /// Dust granted for clearing a wave.
    pub wave_clear_dust: i64,

    /// Score granted for clearing a wave.
    pub wave_clear_score: i64,

    // =========================================================================
    // Defenders
    // =========================================================================
    /// Hero count at session start.
    pub hero_count: u32,
    /// Hero attack damage (hit points).
    pub hero_damage: i64,
    /// Hero attack range (Q16.16 units).
    pub hero_range: Fixed,
    /// Hero attack cooldown in ticks.
    pub hero_cooldown: u32,

    /// Turret count at session start.
    pub turret_count: u32,
    /// Turret attack damage (hit points).
    pub turret_damage: i64,
    /// Turret attack range (Q16.16 units).
    pub turret_range: Fixed,
    /// Turret attack cooldown in ticks.
    pub turret_cooldown: u32,

    /// Fortress hit points.
    pub fortress_max_hp: i64,

    // =========================================================================
    // Boss rush
    // =========================================================================
    /// Hit points of boss index 0, cycle 0.
    pub boss_base_hp: i64,

    /// Per-boss-index exponential scaling factor (Q16.16). Default 1.10.
    pub scaling_per_boss: Fixed,

    /// Per-cycle compounding multiplier (Q16.16). Default 2.0.
    pub cycle_scaling: Fixed,

    /// Squad damage dealt to the boss per combat tick, before modifiers.
    pub squad_base_damage: i64,

    /// Base gold granted per boss kill (scaled by boss index and cycle).
    pub boss_gold_reward: i64,
    /// Base dust granted per boss kill.
    pub boss_dust_reward: i64,
    /// Base xp granted per boss kill.
    pub boss_xp_reward: i64,

    // =========================================================================
    // Boss-rush summary bounds
    // =========================================================================
    /// Absolute ceiling on total damage in a submitted summary.
    pub max_total_damage: i64,

    /// Ceiling on average damage per boss kill.
    pub max_damage_per_boss: i64,

    /// Ceiling on the submitted kill count.
    pub max_bosses_killed: i64,

    /// Multiplier on the wall-clock-derived tick ceiling.
    pub duration_slack_mult: u32,

    /// Flat grace added to the wall-clock-derived tick ceiling, in ticks.
    pub duration_grace_ticks: u32,

    // =========================================================================
    // Verification
    // =========================================================================
    /// Absolute tolerance between replayed and claimed score. Hash-chain
    /// equality has zero tolerance; this only absorbs legitimate rounding
    /// paths in score presentation.
    pub score_tolerance: i64,

    /// Ceiling on the submitted event array length.
    pub max_events: u32,

    /// Ceiling on the submitted checkpoint array length.
    pub max_checkpoints: u32,

    /// Ceiling on the bincode-encoded submission size, in bytes.
    pub max_submission_bytes: u64,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,

            tick_rate: 30,
            checkpoint_interval: 300,   // every 10 seconds
            max_session_ticks: 54_000,  // 30 minutes
            intermission_ticks: 150,    // 5 seconds

            relic_options: 3,
            reroll_cost_dust: 10,

            base_wave_enemies: 6,
            enemies_per_wave: 2,
            spawn_interval_ticks: 20,
            enemy_hp_growth: to_fixed(1.12),
            enemy_damage_growth: to_fixed(1.08),
            wave_clear_dust: 25,
            wave_clear_score: 100,

            hero_count: 3,
            hero_damage: 12,
            hero_range: to_fixed(6.0),
            hero_cooldown: 20,

            turret_count: 4,
            turret_damage: 6,
            turret_range: to_fixed(9.0),
            turret_cooldown: 30,

            fortress_max_hp: 1_000,

            boss_base_hp: 2_000,
            scaling_per_boss: to_fixed(1.10),
            cycle_scaling: to_fixed(2.0),
            squad_base_damage: 25,
            boss_gold_reward: 50,
            boss_dust_reward: 5,
            boss_xp_reward: 100,

            max_total_damage: 5_000_000_000,
            max_damage_per_boss: 2_000_000,
            max_bosses_killed: 5_000,
            duration_slack_mult: 2,
            duration_grace_ticks: 600,

            score_tolerance: 1,
            max_events: 4_096,
            max_checkpoints: 2_048,
            max_submission_bytes: 262_144,
        }
    }
}

impl ConfigSnapshot {
    /// SHA-256 digest over an explicit field serialization.
    ///
    /// Bound into the session token so a submission cannot swap in a
    /// different balance set. Field order is part of the contract;
    /// changing it requires a [`CONFIG_VERSION`] bump.
    pub fn digest(&self) -> Digest256 {
        let mut hasher = Sha256::new();
        hasher.update(b"EMBERHOLD_CONFIG_V1");

        hasher.update(self.version.to_le_bytes());

        hasher.update(self.tick_rate.to_le_bytes());
        hasher.update(self.checkpoint_interval.to_le_bytes());
        hasher.update(self.max_session_ticks.to_le_bytes());
        hasher.update(self.intermission_ticks.to_le_bytes());

        hasher.update(self.relic_options.to_le_bytes());
        hasher.update(self.reroll_cost_dust.to_le_bytes());

        hasher.update(self.base_wave_enemies.to_le_bytes());
        hasher.update(self.enemies_per_wave.to_le_bytes());
        hasher.update(self.spawn_interval_ticks.to_le_bytes());
        hasher.update(self.enemy_hp_growth.to_le_bytes());
        hasher.update(self.enemy_damage_growth.to_le_bytes());
        hasher.update(self.wave_clear_dust.to_le_bytes());
        hasher.update(self.wave_clear_score.to_le_bytes());

        hasher.update(self.hero_count.to_le_bytes());
        hasher.update(self.hero_damage.to_le_bytes());
        hasher.update(self.hero_range.to_le_bytes());
        hasher.update(self.hero_cooldown.to_le_bytes());
        hasher.update(self.turret_count.to_le_bytes());
        hasher.update(self.turret_damage.to_le_bytes());
        hasher.update(self.turret_range.to_le_bytes());
        hasher.update(self.turret_cooldown.to_le_bytes());
        hasher.update(self.fortress_max_hp.to_le_bytes());

        hasher.update(self.boss_base_hp.to_le_bytes());
        hasher.update(self.scaling_per_boss.to_le_bytes());
        hasher.update(self.cycle_scaling.to_le_bytes());
        hasher.update(self.squad_base_damage.to_le_bytes());
        hasher.update(self.boss_gold_reward.to_le_bytes());
        hasher.update(self.boss_dust_reward.to_le_bytes());
        hasher.update(self.boss_xp_reward.to_le_bytes());

        hasher.update(self.max_total_damage.to_le_bytes());
        hasher.update(self.max_damage_per_boss.to_le_bytes());
        hasher.update(self.max_bosses_killed.to_le_bytes());
        hasher.update(self.duration_slack_mult.to_le_bytes());
        hasher.update(self.duration_grace_ticks.to_le_bytes());

        hasher.update(self.score_tolerance.to_le_bytes());
        hasher.update(self.max_events.to_le_bytes());
        hasher.update(self.max_checkpoints.to_le_bytes());
        hasher.update(self.max_submission_bytes.to_le_bytes());

        hasher.finalize().into()
    }

    /// Whether `tick` falls on the checkpoint schedule.
    #[inline]
    pub fn is_checkpoint_tick(&self, tick: u32) -> bool {
        tick > 0 && self.checkpoint_interval > 0 && tick % self.checkpoint_interval == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
