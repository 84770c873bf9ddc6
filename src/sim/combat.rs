//! Combat Resolution
//!
//! Deterministic per-tick combat: enemy advance, fortress contact damage,
//! and defender attacks. Everything iterates in entity-id order (BTreeMap)
//! and rolls the RNG only at the moment an attack lands, so two replays of
//! the same state consume the stream identically.

use crate::core::fixed::{Fixed, fixed_mul, FORTRESS_CONTACT_RANGE};
use crate::core::vec2::FixedVec2;
use crate::sim::relic::apply_mult;
use crate::sim::state::{EntityId, GamePhase, GameState};

/// Advance all enemies one tick and resolve fortress contact hits.
///
/// Enemies walk straight toward the origin. Inside contact range they stop
/// and swing on their attack interval; armor reduces each hit, floored at
/// zero. Reaching zero fortress hp is a phase transition, not an error.
pub fn advance_enemies(state: &mut GameState) {
    let armor = state.modifiers.fortress_armor;
    let mut fortress_damage: i64 = 0;

    // BTreeMap iterates in id order - deterministic
    for enemy in state.enemies.values_mut() {
        let dist_sq = enemy.position.length_squared();
        let contact_sq = fixed_mul(FORTRESS_CONTACT_RANGE, FORTRESS_CONTACT_RANGE);

        if dist_sq > contact_sq {
            // Walk toward the fortress at the origin
            let dir = enemy.position.normalize().negate();
            enemy.position = enemy.position.add(dir.scale(enemy.kind.speed()));
            enemy.position = enemy.position.clamp_to_field();
            continue;
        }

        // In contact: swing on the attack interval
        if enemy.attack_cooldown == 0 {
            let hit = (enemy.contact_damage - armor).max(0);
            fortress_damage += hit;
            enemy.attack_cooldown = enemy.kind.attack_interval();
        } else {
            enemy.attack_cooldown -= 1;
        }
    }

    if fortress_damage > 0 {
        state.fortress.hp -= fortress_damage;
        if state.fortress.hp <= 0 {
            state.fortress.hp = 0;
            state.phase = GamePhase::Defeated;
        }
    }
}

/// Resolve defender attacks: heroes first, then turrets, each in id order.
///
/// Target selection is the nearest living enemy in range, ties broken by
/// lower id. Damage applies immediately, so a kill by an earlier attacker
/// retargets every later one - sequentially, deterministically.
pub fn defender_attacks(state: &mut GameState) {
    tick_down_cooldowns(state);

    let hero_ids: Vec<EntityId> = state.heroes.keys().copied().collect();
    for id in hero_ids {
        let (ready, position, range, damage, base_cooldown) = {
            let hero = &state.heroes[&id];
            (hero.cooldown_remaining == 0, hero.position, hero.range, hero.damage, hero.cooldown_ticks)
        };
        if !ready {
            continue;
        }
        if attack_nearest(state, position, range, damage) {
            let cooldown = state.modifiers.scale_cooldown(base_cooldown);
            if let Some(hero) = state.heroes.get_mut(&id) {
                hero.cooldown_remaining = cooldown;
            }
        }
    }

    let turret_ids: Vec<EntityId> = state.turrets.keys().copied().collect();
    for id in turret_ids {
        let (ready, position, range, damage, base_cooldown) = {
            let turret = &state.turrets[&id];
            (turret.cooldown_remaining == 0, turret.position, turret.range, turret.damage, turret.cooldown_ticks)
        };
        if !ready {
            continue;
        }
        if attack_nearest(state, position, range, damage) {
            let cooldown = state.modifiers.scale_cooldown(base_cooldown);
            if let Some(turret) = state.turrets.get_mut(&id) {
                turret.cooldown_remaining = cooldown;
            }
        }
    }
}

/// Decrement every defender cooldown by one tick.
fn tick_down_cooldowns(state: &mut GameState) {
    for hero in state.heroes.values_mut() {
        hero.cooldown_remaining = hero.cooldown_remaining.saturating_sub(1);
    }
    for turret in state.turrets.values_mut() {
        turret.cooldown_remaining = turret.cooldown_remaining.saturating_sub(1);
    }
}

/// Attack the nearest enemy in range. Returns whether an attack landed.
///
/// The crit roll happens only when a target exists, which keeps the RNG
/// stream a pure function of simulation state.
fn attack_nearest(state: &mut GameState, from: FixedVec2, range: Fixed, base_damage: i64) -> bool {
    let Some(target_id) = select_target(state, from, range) else {
        return false;
    };

    let crit = state.rng.next_bool(state.modifiers.crit_chance);
    let mut damage = state.modifiers.scale_damage(base_damage);
    if crit {
        damage = apply_mult(damage, state.modifiers.crit_mult);
    }
    damage = damage.max(1);

    let dead = {
        let Some(enemy) = state.enemies.get_mut(&target_id) else {
            return false;
        };
        enemy.hp -= damage;
        enemy.hp <= 0
    };

    if dead {
        kill_enemy(state, target_id);
    }
    true
}

/// Nearest living enemy within range; ties broken by lower id.
fn select_target(state: &GameState, from: FixedVec2, range: Fixed) -> Option<EntityId> {
    let range_sq = fixed_mul(range, range);

    state
        .enemies
        .values()
        .filter_map(|enemy| {
            let dist_sq = from.distance_squared(enemy.position);
            (dist_sq <= range_sq).then_some((dist_sq, enemy.id))
        })
        .min()
        .map(|(_, id)| id)
}

/// Remove a dead enemy and accrue its rewards explicitly.
fn kill_enemy(state: &mut GameState, id: EntityId) {
    let Some(enemy) = state.enemies.remove(&id) else {
        return;
    };

    // Explicit accrual: bounty into the gold ledger (gold mult applied),
    // raw bounty into the score.
    state.resources.gold_earned += state.modifiers.scale_gold(enemy.bounty);
    state.score += enemy.bounty;
}

/// Regenerate the fortress from relic-derived regen, capped at max hp.
pub fn regenerate_fortress(state: &mut GameState) {
    let regen = state.modifiers.fortress_regen;
    if regen > 0 && state.fortress.hp > 0 {
        state.fortress.hp = (state.fortress.hp + regen).min(state.fortress.max_hp);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;
    use crate::sim::config::ConfigSnapshot;
    use crate::sim::state::{EnemyKind, GameMode};

    fn fresh(seed: u64) -> GameState {
        GameState::new([2; 16], seed, &ConfigSnapshot::default(), GameMode::Campaign)
    }

    #[test]
    fn test_enemies_advance_toward_fortress() {
        let mut state = fresh(1);
        let id = state.spawn_enemy(EnemyKind::Grunt, 0, 30, 5, 4);

        let before = state.enemies[&id].position.length_squared();
        advance_enemies(&mut state);
        let after = state.enemies[&id].position.length_squared();

        assert!(after < before, "enemy should close on the fortress");
    }

    #[test]
    fn test_contact_damage_and_armor() {
        let mut state = fresh(1);
        let id = state.spawn_enemy(EnemyKind::Grunt, 0, 30, 5, 4);
        state.enemies.get_mut(&id).unwrap().position = FixedVec2::new(to_fixed(0.5), 0);

        let hp_before = state.fortress.hp;
        advance_enemies(&mut state);
        assert_eq!(state.fortress.hp, hp_before - 5);

        // Armor floors each hit at zero
        state.modifiers.fortress_armor = 100;
        state.enemies.get_mut(&id).unwrap().attack_cooldown = 0;
        let hp_before = state.fortress.hp;
        advance_enemies(&mut state);
        assert_eq!(state.fortress.hp, hp_before);
    }

    #[test]
    fn test_fortress_destruction_is_transition() {
        let mut state = fresh(1);
        state.fortress.hp = 3;
        let id = state.spawn_enemy(EnemyKind::Brute, 0, 90, 15, 12);
        state.enemies.get_mut(&id).unwrap().position = FixedVec2::ZERO;

        advance_enemies(&mut state);

        assert_eq!(state.fortress.hp, 0);
        assert_eq!(state.phase, GamePhase::Defeated);
    }

    #[test]
    fn test_target_selection_nearest_then_lowest_id() {
        let mut state = fresh(1);

        let far = state.spawn_enemy(EnemyKind::Grunt, 0, 30, 5, 4);
        let near = state.spawn_enemy(EnemyKind::Grunt, 0, 30, 5, 4);
        state.enemies.get_mut(&far).unwrap().position = FixedVec2::new(to_fixed(5.0), 0);
        state.enemies.get_mut(&near).unwrap().position = FixedVec2::new(to_fixed(2.0), 0);

        let picked = select_target(&state, FixedVec2::ZERO, to_fixed(10.0));
        assert_eq!(picked, Some(near));

        // Equidistant: lower id wins
        state.enemies.get_mut(&far).unwrap().position = FixedVec2::new(to_fixed(2.0), 0);
        let picked = select_target(&state, FixedVec2::ZERO, to_fixed(10.0));
        assert_eq!(picked, Some(far.min(near)));
    }

    #[test]
    fn test_kill_accrues_bounty_explicitly() {
        let mut state = fresh(1);
        let id = state.spawn_enemy(EnemyKind::Grunt, 0, 1, 5, 4);
        // Park the enemy inside hero range
        state.enemies.get_mut(&id).unwrap().position = FixedVec2::new(to_fixed(3.0), 0);

        defender_attacks(&mut state);

        assert!(state.enemies.is_empty(), "1 hp enemy should die to the first hit");
        assert_eq!(state.resources.gold_earned, 4);
        assert_eq!(state.score, 4);
    }

    #[test]
    fn test_combat_determinism() {
        let run = |seed: u64| {
            let mut state = fresh(seed);
            for slot in 0..6 {
                state.spawn_enemy(EnemyKind::Runner, slot, 18, 3, 5);
            }
            for _ in 0..200 {
                advance_enemies(&mut state);
                defender_attacks(&mut state);
                regenerate_fortress(&mut state);
            }
            state.compute_hash()
        };

        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn test_regen_caps_at_max() {
        let mut state = fresh(1);
        state.fortress.hp = state.fortress.max_hp - 2;
        state.modifiers.fortress_regen = 10;

        regenerate_fortress(&mut state);
        assert_eq!(state.fortress.hp, state.fortress.max_hp);
    }
}
