//! Game State Definitions
//!
//! The single aggregate the stepper advances. Owned exclusively by
//! whichever loop is driving it (client render loop or server replay);
//! mutation happens only through tick advance and validated events.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, to_fixed, FIELD_HALF_EXTENT};
use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash32, StateHasher};
use crate::sim::config::ConfigSnapshot;
use crate::sim::relic::{RelicId, RelicChoice, Modifiers};
use crate::sim::wave::WaveState;
use crate::sim::bossrush::BossRushState;

/// Monotonically increasing entity identifier, unique within a session.
pub type EntityId = u32;

/// Which simulation a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Wave defense, fully replay-verified.
    #[default]
    Campaign,
    /// Endless boss gauntlet, bounds-verified.
    BossRush,
}

// =============================================================================
// ENEMIES
// =============================================================================

/// Enemy archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnemyKind {
    /// Baseline walker.
    Grunt = 0,
    /// Fast, fragile.
    Runner = 1,
    /// Slow, heavy, hits hard.
    Brute = 2,
    /// Mid-speed, high bounty.
    Warlock = 3,
}

impl EnemyKind {
    /// Base hit points before wave growth.
    pub fn base_hp(self) -> i64 {
        match self {
            EnemyKind::Grunt => 30,
            EnemyKind::Runner => 18,
            EnemyKind::Brute => 90,
            EnemyKind::Warlock => 45,
        }
    }

    /// Movement speed in units per tick (Q16.16).
    pub fn speed(self) -> Fixed {
        match self {
            EnemyKind::Grunt => to_fixed(0.10),
            EnemyKind::Runner => to_fixed(0.20),
            EnemyKind::Brute => to_fixed(0.06),
            EnemyKind::Warlock => to_fixed(0.12),
        }
    }

    /// Base contact damage against the fortress, per hit.
    pub fn base_damage(self) -> i64 {
        match self {
            EnemyKind::Grunt => 5,
            EnemyKind::Runner => 3,
            EnemyKind::Brute => 15,
            EnemyKind::Warlock => 8,
        }
    }

    /// Base gold bounty on kill.
    pub fn base_bounty(self) -> i64 {
        match self {
            EnemyKind::Grunt => 4,
            EnemyKind::Runner => 5,
            EnemyKind::Brute => 12,
            EnemyKind::Warlock => 10,
        }
    }

    /// Ticks between contact hits.
    pub fn attack_interval(self) -> u32 {
        match self {
            EnemyKind::Grunt => 30,
            EnemyKind::Runner => 20,
            EnemyKind::Brute => 45,
            EnemyKind::Warlock => 30,
        }
    }
}

/// One enemy on the field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enemy {
    /// Entity id.
    pub id: EntityId,
    /// Archetype.
    pub kind: EnemyKind,
    /// Position on the field.
    pub position: FixedVec2,
    /// Remaining hit points (wave-scaled).
    pub hp: i64,
    /// Hit points at spawn.
    pub max_hp: i64,
    /// Contact damage against the fortress (wave-scaled).
    pub contact_damage: i64,
    /// Gold bounty on kill.
    pub bounty: i64,
    /// Ticks until the next contact hit (0 = ready).
    pub attack_cooldown: u32,
}

impl Enemy {
    /// Hash outcome-relevant fields into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id);
        hasher.update_u8(self.kind as u8);
        hasher.update_vec2(self.position);
        hasher.update_i64(self.hp);
        hasher.update_i64(self.contact_damage);
        hasher.update_i64(self.bounty);
        hasher.update_u32(self.attack_cooldown);
    }
}

// =============================================================================
// DEFENDERS
// =============================================================================

/// A hero defending the fortress from a fixed post.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hero {
    /// Entity id.
    pub id: EntityId,
    /// Post position.
    pub position: FixedVec2,
    /// Attack damage before modifiers.
    pub damage: i64,
    /// Attack range (Q16.16 units).
    pub range: Fixed,
    /// Base attack cooldown in ticks.
    pub cooldown_ticks: u32,
    /// Ticks until the next attack (0 = ready).
    pub cooldown_remaining: u32,
}

/// A stationary turret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turret {
    /// Entity id.
    pub id: EntityId,
    /// Mount position.
    pub position: FixedVec2,
    /// Attack damage before modifiers.
    pub damage: i64,
    /// Attack range (Q16.16 units).
    pub range: Fixed,
    /// Base attack cooldown in ticks.
    pub cooldown_ticks: u32,
    /// Ticks until the next attack (0 = ready).
    pub cooldown_remaining: u32,
}

impl Hero {
    /// Hash outcome-relevant fields into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id);
        hasher.update_vec2(self.position);
        hasher.update_i64(self.damage);
        hasher.update_u32(self.cooldown_remaining);
    }
}

impl Turret {
    /// Hash outcome-relevant fields into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id);
        hasher.update_vec2(self.position);
        hasher.update_i64(self.damage);
        hasher.update_u32(self.cooldown_remaining);
    }
}

/// The structure being defended. Sits at the origin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fortress {
    /// Remaining hit points.
    pub hp: i64,
    /// Hit point ceiling.
    pub max_hp: i64,
}

impl Fortress {
    /// Hash outcome-relevant fields into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_i64(self.hp);
        hasher.update_i64(self.max_hp);
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Currency ledger.
///
/// Every currency tracks earned and spent separately; availability is
/// always the difference. Nothing ever subtracts from an earned total,
/// which is what makes gold conservation checkable after the fact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Total gold ever earned.
    pub gold_earned: i64,
    /// Total gold ever spent.
    pub gold_spent: i64,
    /// Total dust ever earned.
    pub dust_earned: i64,
    /// Total dust ever spent (rerolls).
    pub dust_spent: i64,
    /// Milestone materials earned (never spent in-engine).
    pub materials_earned: i64,
}

impl Resources {
    /// Gold available to spend.
    #[inline]
    pub fn gold_available(&self) -> i64 {
        self.gold_earned - self.gold_spent
    }

    /// Dust available to spend.
    #[inline]
    pub fn dust_available(&self) -> i64 {
        self.dust_earned - self.dust_spent
    }

    /// Hash the ledger into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_i64(self.gold_earned);
        hasher.update_i64(self.gold_spent);
        hasher.update_i64(self.dust_earned);
        hasher.update_i64(self.dust_spent);
        hasher.update_i64(self.materials_earned);
    }
}

// =============================================================================
// PHASE & MODE
// =============================================================================

/// Top-level session phase. Defeat is a transition, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// Simulation advancing normally.
    #[default]
    Running,
    /// Fortress destroyed; the field is frozen but ticks still advance
    /// so the checkpoint schedule stays aligned.
    Defeated,
}

/// Mode-specific sub-state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ModeState {
    /// Campaign wave machinery.
    Campaign(WaveState),
    /// Boss-rush gauntlet machinery.
    BossRush(BossRushState),
}

impl ModeState {
    /// Hash the mode sub-state into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        match self {
            ModeState::Campaign(wave) => {
                hasher.update_u8(0);
                wave.hash_into(hasher);
            }
            ModeState::BossRush(rush) => {
                hasher.update_u8(1);
                rush.hash_into(hasher);
            }
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Fixed hero posts, clockwise ring around the fortress.
const HERO_POSTS: [(i32, i32); 6] = [(4, 0), (-4, 0), (0, 4), (0, -4), (3, 3), (-3, -3)];

/// Fixed turret mounts on the walls.
const TURRET_MOUNTS: [(i32, i32); 8] = [
    (8, 8), (-8, 8), (8, -8), (-8, -8),
    (10, 0), (-10, 0), (0, 10), (0, -10),
];

/// Complete state of one session.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Session identifier (UUID bytes).
    pub session_id: [u8; 16],

    /// Current tick (0 = initial state, nothing simulated yet).
    pub tick: u32,

    /// Top-level phase.
    pub phase: GamePhase,

    /// RNG seed (hashed into snapshots for verification).
    pub seed: u64,

    /// The single session-scoped RNG stream.
    pub rng: DeterministicRng,

    /// The fortress.
    pub fortress: Fortress,

    /// Heroes by id (BTreeMap for deterministic iteration).
    pub heroes: BTreeMap<EntityId, Hero>,

    /// Turrets by id.
    pub turrets: BTreeMap<EntityId, Turret>,

    /// Live enemies by id.
    pub enemies: BTreeMap<EntityId, Enemy>,

    /// Next entity id (monotonic, shared across entity kinds).
    pub next_entity_id: EntityId,

    /// Currency ledger.
    pub resources: Resources,

    /// Owned relics in acquisition order.
    pub relics: Vec<RelicId>,

    /// Derived modifiers, recomputed from `relics` on every change.
    pub modifiers: Modifiers,

    /// Pending relic decision, if one is offered.
    pub pending_choice: Option<RelicChoice>,

    /// Canonical score.
    pub score: i64,

    /// Mode-specific sub-state.
    pub mode: ModeState,

    /// Running hash-chain register. Derived from emitted checkpoints,
    /// so it is NOT part of the snapshot hash input.
    pub chain: StateHash32,
}

impl GameState {
    /// Create the tick-0 state for a session.
    pub fn new(session_id: [u8; 16], seed: u64, config: &ConfigSnapshot, mode: GameMode) -> Self {
        let mut state = Self {
            session_id,
            tick: 0,
            phase: GamePhase::Running,
            seed,
            rng: DeterministicRng::new(seed),
            fortress: Fortress {
                hp: config.fortress_max_hp,
                max_hp: config.fortress_max_hp,
            },
            heroes: BTreeMap::new(),
            turrets: BTreeMap::new(),
            enemies: BTreeMap::new(),
            next_entity_id: 0,
            resources: Resources::default(),
            relics: Vec::new(),
            modifiers: Modifiers::identity(),
            pending_choice: None,
            score: 0,
            mode: match mode {
                GameMode::Campaign => ModeState::Campaign(WaveState::new()),
                GameMode::BossRush => ModeState::BossRush(BossRushState::new(config)),
            },
            chain: 0,
        };

        // Defender layout comes from fixed tables, not the RNG: the
        // stream must start clean for the first composition roll.
        for i in 0..config.hero_count.min(HERO_POSTS.len() as u32) {
            let (x, y) = HERO_POSTS[i as usize];
            let id = state.alloc_entity_id();
            state.heroes.insert(id, Hero {
                id,
                position: FixedVec2::from_ints(x, y),
                damage: config.hero_damage,
                range: config.hero_range,
                cooldown_ticks: config.hero_cooldown,
                cooldown_remaining: 0,
            });
        }

        for i in 0..config.turret_count.min(TURRET_MOUNTS.len() as u32) {
            let (x, y) = TURRET_MOUNTS[i as usize];
            let id = state.alloc_entity_id();
            state.turrets.insert(id, Turret {
                id,
                position: FixedVec2::from_ints(x, y),
                damage: config.turret_damage,
                range: config.turret_range,
                cooldown_ticks: config.turret_cooldown,
                cooldown_remaining: 0,
            });
        }

        state
    }

    /// Allocate the next entity id.
    pub fn alloc_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Spawn an enemy at a perimeter gate.
    ///
    /// Gate and offset derive from the slot index, not the RNG.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, slot: u32, hp: i64, contact_damage: i64, bounty: i64) -> EntityId {
        let gate = slot % 4;
        let lane_offset = ((slot / 4) as i32 % 5 - 2) << 16; // -2..=2 units

        let position = match gate {
            0 => FixedVec2::new(FIELD_HALF_EXTENT, lane_offset),
            1 => FixedVec2::new(-FIELD_HALF_EXTENT, lane_offset),
            2 => FixedVec2::new(lane_offset, FIELD_HALF_EXTENT),
            _ => FixedVec2::new(lane_offset, -FIELD_HALF_EXTENT),
        };

        let id = self.alloc_entity_id();
        self.enemies.insert(id, Enemy {
            id,
            kind,
            position,
            hp,
            max_hp: hp,
            contact_damage,
            bounty,
            attack_cooldown: 0,
        });
        id
    }

    /// Acquire a relic: append to the set and recompute all modifiers.
    pub fn add_relic(&mut self, id: RelicId) {
        self.relics.push(id);
        self.modifiers = Modifiers::recompute(&self.relics);
    }

    /// Whether the session is in the defeated phase.
    #[inline]
    pub fn is_defeated(&self) -> bool {
        matches!(self.phase, GamePhase::Defeated)
    }

    /// Compute the 32-bit snapshot hash of the current state.
    ///
    /// This IS the versioned snapshot serialization: field order here is
    /// a wire contract shared with every client build. The chain register
    /// is excluded (it is derived from these hashes).
    pub fn compute_hash(&self) -> StateHash32 {
        let mut hasher = StateHasher::for_snapshot();

        hasher.update_u32(self.tick);
        hasher.update_u64(self.seed);
        let rng_state = self.rng.state();
        hasher.update_u64(rng_state[0]);
        hasher.update_u64(rng_state[1]);

        hasher.update_u8(match self.phase {
            GamePhase::Running => 0,
            GamePhase::Defeated => 1,
        });

        self.resources.hash_into(&mut hasher);
        self.fortress.hash_into(&mut hasher);

        hasher.update_u32(self.heroes.len() as u32);
        for hero in self.heroes.values() {
            hero.hash_into(&mut hasher);
        }

        hasher.update_u32(self.turrets.len() as u32);
        for turret in self.turrets.values() {
            turret.hash_into(&mut hasher);
        }

        hasher.update_u32(self.enemies.len() as u32);
        for enemy in self.enemies.values() {
            enemy.hash_into(&mut hasher);
        }

        hasher.update_u32(self.relics.len() as u32);
        for relic in &self.relics {
            hasher.update_u16(relic.0);
        }
        self.modifiers.hash_into(&mut hasher);

        match &self.pending_choice {
            Some(choice) => {
                hasher.update_bool(true);
                choice.hash_into(&mut hasher);
            }
            None => hasher.update_bool(false),
        }

        hasher.update_i64(self.score);
        self.mode.hash_into(&mut hasher);

        hasher.finalize()
    }
}

// =============================================================================
// TESTS
// =============================================================================
