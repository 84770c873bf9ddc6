//! Relics and Derived Modifiers
//!
//! Relics are mid-run modifiers picked at decision points. The numeric
//! modifiers they produce are always recomputed from the complete owned
//! set - never patched incrementally - so two engines that arrive at the
//! same set by any path hold bit-identical modifiers.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, FIXED_ONE, to_fixed, fixed_mul, fixed_min};
use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;

/// Identifier of a relic in the static catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelicId(pub u16);

/// Relic rarity tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Rare = 1,
    Epic = 2,
}

/// One numeric effect contributed by a relic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelicEffect {
    /// Multiplies all outgoing damage (Q16.16 factor).
    DamageMult(Fixed),
    /// Multiplies attack rate - shortens cooldowns (Q16.16 factor).
    RateMult(Fixed),
    /// Multiplies gold income (Q16.16 factor).
    GoldMult(Fixed),
    /// Adds critical-hit chance (Q16.16, FIXED_ONE = 100%).
    CritChance(Fixed),
    /// Adds to the critical-hit damage multiplier (Q16.16).
    CritMult(Fixed),
    /// Flat reduction of damage the fortress takes per hit.
    FortressArmor(i64),
    /// Flat fortress hit points regenerated per tick.
    FortressRegen(i64),
}

/// Static definition of one relic.
#[derive(Clone, Copy, Debug)]
pub struct RelicDef {
    /// Catalog id.
    pub id: RelicId,
    /// Display name.
    pub name: &'static str,
    /// Rarity tier (drives roll weighting).
    pub rarity: Rarity,
    /// Effects folded into [`Modifiers`] while owned.
    pub effects: &'static [RelicEffect],
}

/// The full relic catalog. Ids are stable forever; new relics append.
pub static CATALOG: &[RelicDef] = &[
    // Common
    RelicDef { id: RelicId(0), name: "Whetstone", rarity: Rarity::Common, effects: &[RelicEffect::DamageMult(to_fixed(1.10))] },
    RelicDef { id: RelicId(1), name: "Drillmaster's Horn", rarity: Rarity::Common, effects: &[RelicEffect::RateMult(to_fixed(1.10))] },
    RelicDef { id: RelicId(2), name: "Tithe Ledger", rarity: Rarity::Common, effects: &[RelicEffect::GoldMult(to_fixed(1.15))] },
    RelicDef { id: RelicId(3), name: "Iron Rivets", rarity: Rarity::Common, effects: &[RelicEffect::FortressArmor(1)] },
    RelicDef { id: RelicId(4), name: "Mortar Trowel", rarity: Rarity::Common, effects: &[RelicEffect::FortressRegen(1)] },
    RelicDef { id: RelicId(5), name: "Flint Caps", rarity: Rarity::Common, effects: &[RelicEffect::CritChance(to_fixed(0.05))] },
    RelicDef { id: RelicId(6), name: "Balanced Bolts", rarity: Rarity::Common, effects: &[RelicEffect::DamageMult(to_fixed(1.05)), RelicEffect::RateMult(to_fixed(1.05))] },
    RelicDef { id: RelicId(7), name: "Coin Polish", rarity: Rarity::Common, effects: &[RelicEffect::GoldMult(to_fixed(1.10)), RelicEffect::CritChance(to_fixed(0.02))] },
    RelicDef { id: RelicId(8), name: "Watch Bell", rarity: Rarity::Common, effects: &[RelicEffect::RateMult(to_fixed(1.08))] },
    RelicDef { id: RelicId(9), name: "Sandbags", rarity: Rarity::Common, effects: &[RelicEffect::FortressArmor(1), RelicEffect::FortressRegen(1)] },
    RelicDef { id: RelicId(10), name: "Sharpened Stakes", rarity: Rarity::Common, effects: &[RelicEffect::DamageMult(to_fixed(1.08))] },
    RelicDef { id: RelicId(11), name: "Oiled Gears", rarity: Rarity::Common, effects: &[RelicEffect::RateMult(to_fixed(1.12))] },
    // Rare
    RelicDef { id: RelicId(12), name: "Ember Sigil", rarity: Rarity::Rare, effects: &[RelicEffect::DamageMult(to_fixed(1.25))] },
    RelicDef { id: RelicId(13), name: "Quickloader", rarity: Rarity::Rare, effects: &[RelicEffect::RateMult(to_fixed(1.25))] },
    RelicDef { id: RelicId(14), name: "Smuggler's Scales", rarity: Rarity::Rare, effects: &[RelicEffect::GoldMult(to_fixed(1.40))] },
    RelicDef { id: RelicId(15), name: "Bulwark Plating", rarity: Rarity::Rare, effects: &[RelicEffect::FortressArmor(3)] },
    RelicDef { id: RelicId(16), name: "Hearthstone Core", rarity: Rarity::Rare, effects: &[RelicEffect::FortressRegen(3)] },
    RelicDef { id: RelicId(17), name: "Executioner's Edge", rarity: Rarity::Rare, effects: &[RelicEffect::CritChance(to_fixed(0.10)), RelicEffect::CritMult(to_fixed(0.25))] },
    RelicDef { id: RelicId(18), name: "War Drums", rarity: Rarity::Rare, effects: &[RelicEffect::DamageMult(to_fixed(1.15)), RelicEffect::RateMult(to_fixed(1.15))] },
    RelicDef { id: RelicId(19), name: "Gilded Quiver", rarity: Rarity::Rare, effects: &[RelicEffect::DamageMult(to_fixed(1.10)), RelicEffect::GoldMult(to_fixed(1.20))] },
    // Epic
    RelicDef { id: RelicId(20), name: "Dragonfire Brazier", rarity: Rarity::Epic, effects: &[RelicEffect::DamageMult(to_fixed(1.50))] },
    RelicDef { id: RelicId(21), name: "Chronal Winch", rarity: Rarity::Epic, effects: &[RelicEffect::RateMult(to_fixed(1.50))] },
    RelicDef { id: RelicId(22), name: "Midas Banner", rarity: Rarity::Epic, effects: &[RelicEffect::GoldMult(to_fixed(2.00))] },
    RelicDef { id: RelicId(23), name: "Heart of the Hold", rarity: Rarity::Epic, effects: &[RelicEffect::FortressArmor(5), RelicEffect::FortressRegen(5), RelicEffect::CritMult(to_fixed(0.50))] },
];

/// Look up a relic definition by id.
pub fn relic_def(id: RelicId) -> Option<&'static RelicDef> {
    CATALOG.get(id.0 as usize).filter(|def| def.id == id)
}

/// Crit chance is capped so crits never become a certainty.
const CRIT_CHANCE_CAP: Fixed = to_fixed(0.95);

/// Base critical-hit damage multiplier before relic contributions.
const BASE_CRIT_MULT: Fixed = to_fixed(1.5);

/// Derived numeric modifiers, fully recomputed from the owned relic set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Multiplier on all outgoing damage.
    pub damage_mult: Fixed,
    /// Multiplier on attack rate (divides cooldowns).
    pub rate_mult: Fixed,
    /// Multiplier on gold income.
    pub gold_mult: Fixed,
    /// Critical-hit chance in [0, CRIT_CHANCE_CAP].
    pub crit_chance: Fixed,
    /// Critical-hit damage multiplier.
    pub crit_mult: Fixed,
    /// Flat reduction of damage the fortress takes per hit.
    pub fortress_armor: i64,
    /// Fortress hit points regenerated per tick.
    pub fortress_regen: i64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::identity()
    }
}

impl Modifiers {
    /// The no-relics baseline.
    pub fn identity() -> Self {
        Self {
            damage_mult: FIXED_ONE,
            rate_mult: FIXED_ONE,
            gold_mult: FIXED_ONE,
            crit_chance: 0,
            crit_mult: BASE_CRIT_MULT,
            fortress_armor: 0,
            fortress_regen: 0,
        }
    }

    /// Recompute from the complete owned set.
    ///
    /// Always starts from identity and folds every relic in acquisition
    /// order. Incremental patching is forbidden: it makes the resulting
    /// numbers depend on the mutation history rather than the set.
    pub fn recompute(relics: &[RelicId]) -> Self {
        let mut m = Self::identity();

        for &id in relics {
            let Some(def) = relic_def(id) else { continue };
            for effect in def.effects {
                match *effect {
                    RelicEffect::DamageMult(f) => m.damage_mult = fixed_mul(m.damage_mult, f),
                    RelicEffect::RateMult(f) => m.rate_mult = fixed_mul(m.rate_mult, f),
                    RelicEffect::GoldMult(f) => m.gold_mult = fixed_mul(m.gold_mult, f),
                    RelicEffect::CritChance(f) => {
                        m.crit_chance = fixed_min(m.crit_chance.wrapping_add(f), CRIT_CHANCE_CAP);
                    }
                    RelicEffect::CritMult(f) => m.crit_mult = m.crit_mult.wrapping_add(f),
                    RelicEffect::FortressArmor(v) => m.fortress_armor += v,
                    RelicEffect::FortressRegen(v) => m.fortress_regen += v,
                }
            }
        }

        m
    }

    /// Apply the damage multiplier to an integer damage amount.
    #[inline]
    pub fn scale_damage(&self, base: i64) -> i64 {
        apply_mult(base, self.damage_mult)
    }

    /// Apply the gold multiplier to an integer gold amount.
    #[inline]
    pub fn scale_gold(&self, base: i64) -> i64 {
        apply_mult(base, self.gold_mult)
    }

    /// Effective cooldown after the rate multiplier, floored at 1 tick.
    #[inline]
    pub fn scale_cooldown(&self, base_ticks: u32) -> u32 {
        let scaled = ((base_ticks as i64) << 16) / (self.rate_mult as i64).max(1);
        (scaled >> 16).max(1) as u32
    }

    /// Hash the derived modifiers into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.damage_mult);
        hasher.update_fixed(self.rate_mult);
        hasher.update_fixed(self.gold_mult);
        hasher.update_fixed(self.crit_chance);
        hasher.update_fixed(self.crit_mult);
        hasher.update_i64(self.fortress_armor);
        hasher.update_i64(self.fortress_regen);
    }
}

/// Multiply an integer amount by a Q16.16 factor, truncating toward zero.
#[inline]
pub fn apply_mult(value: i64, mult: Fixed) -> i64 {
    (value * mult as i64) >> 16
}

// =============================================================================
// CHOICES
// =============================================================================

/// A pending relic decision offered to the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelicChoice {
    /// Wave (campaign) or kill count (boss rush) this choice belongs to.
    pub wave: u32,
    /// Offered options, in roll order.
    pub options: Vec<RelicId>,
    /// Tick the choice was offered.
    pub offered_tick: u32,
    /// Rerolls already spent on this choice.
    pub rerolls_used: u32,
}

impl RelicChoice {
    /// Hash the pending choice into a snapshot digest.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.wave);
        hasher.update_u32(self.options.len() as u32);
        for option in &self.options {
            hasher.update_u16(option.0);
        }
        hasher.update_u32(self.offered_tick);
        hasher.update_u32(self.rerolls_used);
    }
}

/// Bound on rejection-sampling attempts when rolling options.
const MAX_ROLL_ATTEMPTS: u32 = 64;

/// Roll a set of distinct relic options the player does not already own.
///
/// Draw order per option is fixed: rarity first, then index within the
/// rarity pool. Collisions with owned or already-offered relics re-draw;
/// after [`MAX_ROLL_ATTEMPTS`] the owned-set filter is waived so a player
/// holding most of the catalog still gets a full option row.
pub fn roll_relic_options(
    rng: &mut DeterministicRng,
    owned: &[RelicId],
    count: u32,
) -> Vec<RelicId> {
    let mut options: Vec<RelicId> = Vec::with_capacity(count as usize);
    let mut attempts = 0u32;

    while (options.len() as u32) < count {
        let candidate = roll_one(rng);
        attempts += 1;

        let duplicate = options.contains(&candidate);
        let already_owned = owned.contains(&candidate) && attempts <= MAX_ROLL_ATTEMPTS;

        if !duplicate && !already_owned {
            options.push(candidate);
        }

        if attempts > MAX_ROLL_ATTEMPTS * 2 {
            // Catalog exhausted relative to `count`; accept what we have.
            break;
        }
    }

    options
}

/// Roll a single relic: rarity band first, then uniform within the band.
fn roll_one(rng: &mut DeterministicRng) -> RelicId {
    // Weighted distribution: Common 70%, Rare 25%, Epic 5%
    let band = rng.next_int(100);
    let rarity = if band < 70 {
        Rarity::Common
    } else if band < 95 {
        Rarity::Rare
    } else {
        Rarity::Epic
    };

    let pool: Vec<RelicId> = CATALOG
        .iter()
        .filter(|def| def.rarity == rarity)
        .map(|def| def.id)
        .collect();

    let idx = rng.next_int(pool.len() as u32) as usize;
    pool[idx]
}

// =============================================================================
// TESTS
// =============================================================================
