//! Authoritative Simulation Step
//!
//! The core loop that must be 100% deterministic. One call advances
//! exactly one fixed-duration tick and never yields mid-tick: partial-tick
//! state is not a valid hash point.

use crate::sim::bossrush::{process_boss_rush, RushPhase, SHOP_ITEMS};
use crate::sim::combat::{advance_enemies, defender_attacks, regenerate_fortress};
use crate::sim::config::ConfigSnapshot;
use crate::sim::events::{apply, EventError, EventKind, PlayerEvent};
use crate::sim::state::{GameMode, GameState, ModeState};
use crate::sim::wave::process_waves;
use crate::verify::checkpoint::{emit_checkpoint, final_checkpoint, Checkpoint, CheckpointLog};

/// Result of one tick.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Checkpoint emitted this tick, if it was a checkpoint tick.
    pub checkpoint: Option<Checkpoint>,
    /// Whether the session is in the defeated phase after this tick.
    pub defeated: bool,
}

/// Advance the simulation by exactly one tick.
///
/// 1. Apply the events queued for this tick (validate-then-apply; the
///    first invalid event aborts the whole run - semantic rejection).
/// 2. Resolve movement/AI/combat via fixed-point math and RNG draws in
///    fixed order.
/// 3. Accrue economy explicitly (fortress regen; kill bounties inside
///    combat resolution).
/// 4. Emit a checkpoint if this is a checkpoint tick.
///
/// Deaths, wave completion and fortress destruction are state
/// transitions, never errors. After defeat the field freezes but ticks
/// and checkpoints continue, keeping the schedule aligned.
pub fn step(
    state: &mut GameState,
    events: &[PlayerEvent],
    config: &ConfigSnapshot,
) -> Result<StepOutcome, EventError> {
    // 0. Advance the tick counter
    state.tick += 1;

    // 1. Apply queued player events
    for event in events {
        apply(event, state, config)?;
    }

    // 2-3. Resolve the world
    if !state.is_defeated() {
        if matches!(state.mode, ModeState::Campaign(_)) {
            advance_enemies(state);
            defender_attacks(state);
            process_waves(state, config);
        } else {
            process_boss_rush(state, config);
        }
        regenerate_fortress(state);
    }

    // 4. Checkpoint emission
    let checkpoint = if config.is_checkpoint_tick(state.tick) {
        Some(emit_checkpoint(state))
    } else {
        None
    };

    Ok(StepOutcome {
        checkpoint,
        defeated: state.is_defeated(),
    })
}

// =============================================================================
// SCRIPTED REFERENCE CLIENT
// =============================================================================

/// Everything a scripted session produces - the same artifacts a real
/// client would submit at session end.
#[derive(Debug)]
pub struct ScriptedRun {
    /// Final simulation state.
    pub state: GameState,
    /// Every event the scripted client issued, in submission order.
    pub events: Vec<PlayerEvent>,
    /// The checkpoint log recorded during play.
    pub checkpoints: CheckpointLog,
    /// The final-tick checkpoint.
    pub final_checkpoint: Checkpoint,
}

/// Play a session headlessly with a simple deterministic policy: always
/// pick relic option 0 (after one reroll, funds permitting), and buy the
/// cheapest shop item during boss-rush intermissions.
///
/// Used by the demo binary and the replay tests as the honest client.
pub fn run_scripted(
    session_id: [u8; 16],
    seed: u64,
    config: &ConfigSnapshot,
    mode: GameMode,
    ticks: u32,
) -> Result<ScriptedRun, EventError> {
    let mut state = GameState::new(session_id, seed, config, mode);
    let mut events: Vec<PlayerEvent> = Vec::new();
    let mut checkpoints = CheckpointLog::new();

    let mut queued: Vec<PlayerEvent> = Vec::new();
    let mut choice_scheduled_for: Option<u32> = None;
    let mut rerolled = false;
    let mut purchases = 0u32;

    for _ in 0..ticks {
        let next_tick = state.tick + 1;

        // Drain events scheduled for the next tick
        let mut tick_events: Vec<PlayerEvent> = Vec::new();
        while queued.first().map(|e| e.tick) == Some(next_tick) {
            tick_events.push(queued.remove(0));
        }

        let outcome = step(&mut state, &tick_events, config)?;
        events.extend(tick_events);
        if let Some(checkpoint) = outcome.checkpoint {
            checkpoints.push(checkpoint);
        }

        // Schedule a response to a freshly offered choice
        if let Some(choice) = &state.pending_choice {
            if choice_scheduled_for != Some(choice.wave) {
                let wave = choice.wave;
                if !rerolled && wave >= 1 && state.resources.dust_available() >= config.reroll_cost_dust {
                    queued.push(PlayerEvent { tick: state.tick + 1, kind: EventKind::RerollChoice { wave } });
                    queued.push(PlayerEvent { tick: state.tick + 2, kind: EventKind::ChooseRelic { wave, option_index: 0 } });
                    rerolled = true;
                } else {
                    queued.push(PlayerEvent { tick: state.tick + 1, kind: EventKind::ChooseRelic { wave, option_index: 0 } });
                }
                choice_scheduled_for = Some(wave);
            }
        }

        // Boss rush: spend earnings in the shop while it is open
        if queued.is_empty() && purchases < 3 {
            if let ModeState::BossRush(rush) = &state.mode {
                if let RushPhase::Intermission { shop_open: true, ends_at } = &rush.phase {
                    let item = &SHOP_ITEMS[0];
                    if *ends_at > state.tick + 1 && state.resources.gold_available() >= item.cost {
                        queued.push(PlayerEvent { tick: state.tick + 1, kind: EventKind::BuyShopItem { item_index: 0 } });
                        purchases += 1;
                    }
                }
            }
        }
    }

    let final_cp = final_checkpoint(&state);
    Ok(ScriptedRun {
        state,
        events,
        checkpoints,
        final_checkpoint: final_cp,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::GamePhase;

    #[test]
    fn test_full_run_determinism() {
        // Two independent runs from tick 0: byte-identical checkpoints,
        // final state hash and event logs.
        let config = ConfigSnapshot::default();
        let a = run_scripted([6; 16], 2024, &config, GameMode::Campaign, 3000).unwrap();
        let b = run_scripted([6; 16], 2024, &config, GameMode::Campaign, 3000).unwrap();

        assert_eq!(a.state.compute_hash(), b.state.compute_hash());
        assert_eq!(a.checkpoints, b.checkpoints);
        assert_eq!(a.final_checkpoint, b.final_checkpoint);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let config = ConfigSnapshot::default();
        let a = run_scripted([6; 16], 1, &config, GameMode::Campaign, 2000).unwrap();
        let b = run_scripted([6; 16], 2, &config, GameMode::Campaign, 2000).unwrap();

        assert_ne!(a.final_checkpoint.hash, b.final_checkpoint.hash);
    }

    #[test]
    fn test_checkpoint_schedule() {
        let config = ConfigSnapshot::default();
        let run = run_scripted([6; 16], 77, &config, GameMode::Campaign, 2000).unwrap();

        assert_eq!(run.checkpoints.len(), (2000 / config.checkpoint_interval) as usize);
        for (i, checkpoint) in run.checkpoints.checkpoints.iter().enumerate() {
            assert_eq!(checkpoint.tick, (i as u32 + 1) * config.checkpoint_interval);
        }
        assert!(run.checkpoints.ticks_strictly_increasing());
    }

    #[test]
    fn test_campaign_actually_progresses() {
        let config = ConfigSnapshot::default();
        let run = run_scripted([6; 16], 99, &config, GameMode::Campaign, 5000).unwrap();

        let ModeState::Campaign(ws) = &run.state.mode else { unreachable!() };
        assert!(ws.waves_cleared >= 2, "scripted client should clear waves, got {}", ws.waves_cleared);
        assert!(!run.state.relics.is_empty(), "choices should have been made");
        assert!(run.state.score > 0);
        assert!(run.state.resources.gold_earned > 0);
    }

    #[test]
    fn test_bossrush_progresses_and_shops() {
        let config = ConfigSnapshot::default();
        let run = run_scripted([6; 16], 4096, &config, GameMode::BossRush, 6000).unwrap();

        let ModeState::BossRush(rush) = &run.state.mode else { unreachable!() };
        assert!(rush.bosses_killed >= 2, "gauntlet should progress, got {}", rush.bosses_killed);
        assert!(rush.total_damage > 0);
        assert!(rush.achieved_milestones != 0);
        assert!(!rush.purchases.is_empty(), "scripted client should buy shop items");
        assert_eq!(
            run.state.resources.gold_available(),
            run.state.resources.gold_earned - run.state.resources.gold_spent
        );
    }

    #[test]
    fn test_event_failure_aborts_step() {
        let config = ConfigSnapshot::default();
        let mut state = GameState::new([6; 16], 5, &config, GameMode::Campaign);

        let bogus = PlayerEvent { tick: 1, kind: EventKind::ChooseRelic { wave: 0, option_index: 0 } };
        let result = step(&mut state, &[bogus], &config);
        assert_eq!(result.unwrap_err(), EventError::NotInChoiceMode);
    }

    #[test]
    fn test_defeat_freezes_field_but_not_clock() {
        let config = ConfigSnapshot::default();
        let mut state = GameState::new([6; 16], 5, &config, GameMode::Campaign);
        state.fortress.hp = 1;
        state.phase = GamePhase::Defeated;

        let before = state.enemies.len();
        for _ in 0..600 {
            let outcome = step(&mut state, &[], &config).unwrap();
            assert!(outcome.defeated);
        }

        assert_eq!(state.enemies.len(), before, "no spawns after defeat");
        assert_eq!(state.tick, 600);
        // Checkpoints kept flowing on schedule
        assert!(config.is_checkpoint_tick(state.tick));
    }

    #[test]
    fn test_step_advances_exactly_one_tick() {
        let config = ConfigSnapshot::default();
        let mut state = GameState::new([6; 16], 5, &config, GameMode::Campaign);

        for expected in 1..=50u32 {
            step(&mut state, &[], &config).unwrap();
            assert_eq!(state.tick, expected);
        }
    }
}
