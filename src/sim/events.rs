//! Player-Intent Events
//!
//! The closed set of things a player can ask the simulation to do, with a
//! two-phase validate-then-apply contract. A malicious client can submit
//! any log it likes; nothing mutates state until validation passes, and a
//! single invalid event condemns the whole submission.
//!
//! The kind set is a tagged union with exhaustive matching - adding a kind
//! is a compile-time-checked, localized change. Unrecognized kinds on the
//! wire deserialize into [`EventKind::Unknown`] and fail validation with
//! [`EventError::UnknownEventType`].

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::sim::bossrush::SHOP_ITEMS;
use crate::sim::config::ConfigSnapshot;
use crate::sim::relic::roll_relic_options;
use crate::sim::state::{GameState, ModeState};

/// What the player asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Pick one of the offered relic options.
    ChooseRelic {
        /// Wave (campaign) or kill count (boss rush) the choice belongs to.
        wave: u32,
        /// Index into the offered option row.
        option_index: u32,
    },
    /// Replace the offered option row, paying dust.
    RerollChoice {
        /// Wave the pending choice belongs to.
        wave: u32,
    },
    /// Buy an intermission shop item (boss rush only).
    BuyShopItem {
        /// Positional index into the shop catalog.
        item_index: u32,
    },
    /// Any kind this engine version does not recognize.
    #[serde(other)]
    Unknown,
}

/// An immutable, typed record of one player intent at a tick.
///
/// Ordered by tick, ties by log order. The wire format is JSON:
/// `{"tick": 120, "kind": "choose_relic", "wave": 0, "option_index": 2}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEvent {
    /// Tick the intent applies at.
    pub tick: u32,
    /// The intent itself.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Closed set of validation failures. Part of the external contract:
/// callers key messaging and telemetry off these, so variants are stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventError {
    /// No relic choice is pending.
    #[error("no relic choice is pending")]
    NotInChoiceMode,
    /// The event names a different wave than the pending choice.
    #[error("event wave does not match the pending choice")]
    WaveMismatch,
    /// The option index is outside the offered row.
    #[error("option index out of range")]
    InvalidOptionIndex,
    /// The event tick precedes the current simulation tick.
    #[error("event tick is in the past")]
    TickInThePast,
    /// The event tick precedes the tick the choice was offered.
    #[error("event tick precedes the offered choice")]
    TickBeforeChoiceOffered,
    /// Not enough dust to pay for a reroll.
    #[error("insufficient currency for reroll")]
    InsufficientCurrencyForReroll,
    /// The event kind is not part of this engine version.
    #[error("unknown event type")]
    UnknownEventType,
    /// The shop is not accepting purchases.
    #[error("shop is closed")]
    ShopClosed,
    /// The shop item index is outside the catalog.
    #[error("shop item index out of range")]
    InvalidShopItem,
    /// Not enough gold to pay for a purchase.
    #[error("insufficient gold for purchase")]
    InsufficientGoldForPurchase,
}

/// Check an event against current state without mutating anything.
pub fn validate(event: &PlayerEvent, state: &GameState, config: &ConfigSnapshot) -> Result<(), EventError> {
    if event.tick < state.tick {
        return Err(EventError::TickInThePast);
    }

    match event.kind {
        EventKind::Unknown => Err(EventError::UnknownEventType),

        EventKind::ChooseRelic { wave, option_index } => {
            let choice = state.pending_choice.as_ref().ok_or(EventError::NotInChoiceMode)?;
            if event.tick < choice.offered_tick {
                return Err(EventError::TickBeforeChoiceOffered);
            }
            if wave != choice.wave {
                return Err(EventError::WaveMismatch);
            }
            if option_index as usize >= choice.options.len() {
                return Err(EventError::InvalidOptionIndex);
            }
            Ok(())
        }

        EventKind::RerollChoice { wave } => {
            let choice = state.pending_choice.as_ref().ok_or(EventError::NotInChoiceMode)?;
            if event.tick < choice.offered_tick {
                return Err(EventError::TickBeforeChoiceOffered);
            }
            if wave != choice.wave {
                return Err(EventError::WaveMismatch);
            }
            if state.resources.dust_available() < config.reroll_cost_dust {
                return Err(EventError::InsufficientCurrencyForReroll);
            }
            Ok(())
        }

        EventKind::BuyShopItem { item_index } => {
            let open = match &state.mode {
                ModeState::BossRush(rush) => rush.shop_is_open(),
                ModeState::Campaign(_) => false,
            };
            if !open {
                return Err(EventError::ShopClosed);
            }
            let item = SHOP_ITEMS
                .get(item_index as usize)
                .ok_or(EventError::InvalidShopItem)?;
            if state.resources.gold_available() < item.cost {
                return Err(EventError::InsufficientGoldForPurchase);
            }
            Ok(())
        }
    }
}

/// Validate, then mutate state according to the event.
///
/// On success the mutation is complete; on failure state is untouched.
pub fn apply(event: &PlayerEvent, state: &mut GameState, config: &ConfigSnapshot) -> Result<(), EventError> {
    validate(event, state, config)?;

    match event.kind {
        EventKind::ChooseRelic { option_index, .. } => {
            // Validation guarantees the choice and index exist
            let Some(choice) = state.pending_choice.take() else {
                return Err(EventError::NotInChoiceMode);
            };
            let relic = choice.options[option_index as usize];

            // Append and recompute ALL derived modifiers from the full set
            state.add_relic(relic);

            if let ModeState::Campaign(ws) = &mut state.mode {
                let tick = state.tick;
                ws.advance_after_choice(tick, config);
            }
            Ok(())
        }

        EventKind::RerollChoice { .. } => {
            state.resources.dust_spent += config.reroll_cost_dust;

            let options = roll_relic_options(&mut state.rng, &state.relics, config.relic_options);
            let Some(choice) = state.pending_choice.as_mut() else {
                return Err(EventError::NotInChoiceMode);
            };
            choice.options = options;
            choice.rerolls_used += 1;
            Ok(())
        }

        EventKind::BuyShopItem { item_index } => {
            let item = &SHOP_ITEMS[item_index as usize];
            state.resources.gold_spent += item.cost;

            if let ModeState::BossRush(rush) = &mut state.mode {
                rush.purchases.push(item_index as u8);
                rush.recompute_shop_bonus();
            }
            Ok(())
        }

        EventKind::Unknown => Err(EventError::UnknownEventType),
    }
}

/// Whether event ticks are non-decreasing across the whole log.
///
/// Checked structurally before any simulation work; a regressing tick
/// rejects the submission without mutating anything.
pub fn ticks_monotonic(events: &[PlayerEvent]) -> bool {
    events.windows(2).all(|pair| pair[0].tick <= pair[1].tick)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::relic::{RelicChoice, RelicId};
    use crate::sim::state::GameMode;
    use crate::sim::bossrush::RushPhase;

    fn fresh(mode: GameMode) -> (GameState, ConfigSnapshot) {
        let config = ConfigSnapshot::default();
        let state = GameState::new([4; 16], 42, &config, mode);
        (state, config)
    }

    fn offer_choice(state: &mut GameState, wave: u32, offered_tick: u32) {
        state.pending_choice = Some(RelicChoice {
            wave,
            options: vec![RelicId(0), RelicId(12), RelicId(20)],
            offered_tick,
            rerolls_used: 0,
        });
    }

    #[test]
    fn test_choose_without_pending_choice() {
        let (state, config) = fresh(GameMode::Campaign);
        let event = PlayerEvent { tick: 10, kind: EventKind::ChooseRelic { wave: 0, option_index: 0 } };

        assert_eq!(validate(&event, &state, &config), Err(EventError::NotInChoiceMode));
    }

    #[test]
    fn test_choose_wave_mismatch() {
        let (mut state, config) = fresh(GameMode::Campaign);
        offer_choice(&mut state, 3, 5);
        state.tick = 10;

        let event = PlayerEvent { tick: 10, kind: EventKind::ChooseRelic { wave: 2, option_index: 0 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::WaveMismatch));
    }

    #[test]
    fn test_choose_invalid_option_index() {
        let (mut state, config) = fresh(GameMode::Campaign);
        offer_choice(&mut state, 0, 5);
        state.tick = 10;

        let event = PlayerEvent { tick: 10, kind: EventKind::ChooseRelic { wave: 0, option_index: 3 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::InvalidOptionIndex));
    }

    #[test]
    fn test_tick_in_the_past() {
        let (mut state, config) = fresh(GameMode::Campaign);
        state.tick = 100;
        offer_choice(&mut state, 0, 50);

        let event = PlayerEvent { tick: 99, kind: EventKind::ChooseRelic { wave: 0, option_index: 0 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::TickInThePast));
    }

    #[test]
    fn test_tick_before_choice_offered() {
        let (mut state, config) = fresh(GameMode::Campaign);
        state.tick = 10;
        offer_choice(&mut state, 0, 50);

        let event = PlayerEvent { tick: 20, kind: EventKind::ChooseRelic { wave: 0, option_index: 0 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::TickBeforeChoiceOffered));
    }

    #[test]
    fn test_unknown_event_type() {
        let (state, config) = fresh(GameMode::Campaign);
        let event = PlayerEvent { tick: 10, kind: EventKind::Unknown };

        assert_eq!(validate(&event, &state, &config), Err(EventError::UnknownEventType));
    }

    #[test]
    fn test_unknown_kind_deserializes_to_catchall() {
        let json = r#"{"tick": 5, "kind": "dupe_gold", "amount": 9999999}"#;
        let event: PlayerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn test_choose_applies_and_advances_wave() {
        let (mut state, config) = fresh(GameMode::Campaign);
        state.tick = 10;
        offer_choice(&mut state, 0, 5);

        let event = PlayerEvent { tick: 10, kind: EventKind::ChooseRelic { wave: 0, option_index: 1 } };
        apply(&event, &mut state, &config).unwrap();

        assert_eq!(state.relics, vec![RelicId(12)]);
        assert!(state.pending_choice.is_none());
        // Modifiers recomputed from the full set
        assert_eq!(state.modifiers, crate::sim::relic::Modifiers::recompute(&state.relics));

        let ModeState::Campaign(ws) = &state.mode else { unreachable!() };
        assert_eq!(ws.wave, 1);
    }

    #[test]
    fn test_reroll_costs_dust_and_redraws() {
        let (mut state, config) = fresh(GameMode::Campaign);
        state.tick = 10;
        state.resources.dust_earned = 100;
        offer_choice(&mut state, 0, 5);
        let before = state.pending_choice.clone().unwrap();

        let event = PlayerEvent { tick: 10, kind: EventKind::RerollChoice { wave: 0 } };
        apply(&event, &mut state, &config).unwrap();

        let after = state.pending_choice.clone().unwrap();
        assert_eq!(state.resources.dust_spent, config.reroll_cost_dust);
        assert_eq!(after.rerolls_used, 1);
        assert_eq!(after.offered_tick, before.offered_tick);
    }

    #[test]
    fn test_reroll_insufficient_dust() {
        let (mut state, config) = fresh(GameMode::Campaign);
        state.tick = 10;
        offer_choice(&mut state, 0, 5);

        let event = PlayerEvent { tick: 10, kind: EventKind::RerollChoice { wave: 0 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::InsufficientCurrencyForReroll));

        // Failed validation leaves state untouched
        assert_eq!(apply(&event, &mut state, &config), Err(EventError::InsufficientCurrencyForReroll));
        assert_eq!(state.resources.dust_spent, 0);
    }

    #[test]
    fn test_shop_closed_outside_intermission() {
        let (mut state, config) = fresh(GameMode::BossRush);
        state.resources.gold_earned = 1000;

        let event = PlayerEvent { tick: 10, kind: EventKind::BuyShopItem { item_index: 0 } };
        assert_eq!(validate(&event, &state, &config), Err(EventError::ShopClosed));

        // Campaign sessions never have a shop
        let (campaign, config) = fresh(GameMode::Campaign);
        assert_eq!(validate(&event, &campaign, &config), Err(EventError::ShopClosed));
    }

    #[test]
    fn test_shop_purchase_ledger() {
        let (mut state, config) = fresh(GameMode::BossRush);
        state.tick = 10;
        state.resources.gold_earned = 1000;
        {
            let ModeState::BossRush(rush) = &mut state.mode else { unreachable!() };
            rush.phase = RushPhase::Intermission { shop_open: true, ends_at: 100 };
        }

        let event = PlayerEvent { tick: 10, kind: EventKind::BuyShopItem { item_index: 1 } };
        apply(&event, &mut state, &config).unwrap();

        assert_eq!(state.resources.gold_spent, SHOP_ITEMS[1].cost);
        assert_eq!(state.resources.gold_available(), 1000 - SHOP_ITEMS[1].cost);

        let ModeState::BossRush(rush) = &state.mode else { unreachable!() };
        assert_eq!(rush.purchases, vec![1]);
        assert_eq!(rush.squad_bonus_damage, SHOP_ITEMS[1].bonus_damage);
    }

    #[test]
    fn test_shop_invalid_item_and_gold() {
        let (mut state, config) = fresh(GameMode::BossRush);
        state.tick = 10;
        {
            let ModeState::BossRush(rush) = &mut state.mode else { unreachable!() };
            rush.phase = RushPhase::Intermission { shop_open: true, ends_at: 100 };
        }

        let bad_item = PlayerEvent { tick: 10, kind: EventKind::BuyShopItem { item_index: 99 } };
        assert_eq!(validate(&bad_item, &state, &config), Err(EventError::InvalidShopItem));

        let broke = PlayerEvent { tick: 10, kind: EventKind::BuyShopItem { item_index: 0 } };
        assert_eq!(validate(&broke, &state, &config), Err(EventError::InsufficientGoldForPurchase));
    }

    #[test]
    fn test_ticks_monotonic() {
        let mk = |ticks: &[u32]| -> Vec<PlayerEvent> {
            ticks.iter().map(|&t| PlayerEvent { tick: t, kind: EventKind::Unknown }).collect()
        };

        assert!(ticks_monotonic(&mk(&[])));
        assert!(ticks_monotonic(&mk(&[5])));
        assert!(ticks_monotonic(&mk(&[10, 10, 20])));
        assert!(!ticks_monotonic(&mk(&[10, 20, 15])));
    }

    #[test]
    fn test_ticks_monotonic_on_sorted_random_logs() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let mut ticks: Vec<u32> = (0..200).map(|_| rng.gen_range(0..10_000)).collect();
        ticks.sort_unstable();

        let events: Vec<PlayerEvent> = ticks
            .iter()
            .map(|&tick| PlayerEvent { tick, kind: EventKind::RerollChoice { wave: 0 } })
            .collect();
        assert!(ticks_monotonic(&events));

        // Lowering any single interior tick below its predecessor breaks it
        let mut broken = events.clone();
        let mid = broken.len() / 2;
        if broken[mid - 1].tick > 0 {
            broken[mid].tick = broken[mid - 1].tick - 1;
            assert!(!ticks_monotonic(&broken));
        }
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = PlayerEvent { tick: 120, kind: EventKind::ChooseRelic { wave: 3, option_index: 2 } };
        let json = serde_json::to_string(&event).unwrap();
        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
        assert!(json.contains("\"choose_relic\""));
    }
}
