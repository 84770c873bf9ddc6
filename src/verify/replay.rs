//! Replay Orchestrator
//!
//! Reconstructs a campaign session from nothing but the stored seed,
//! config snapshot and the client's event log, then demands exact
//! hash-chain equality at every server-chosen audit tick and the final
//! tick. One manipulated tick invalidates every downstream chain value,
//! so sparse audit spot-checks are sufficient.
//!
//! A one-shot, bounded batch computation: no suspension points, no
//! retries, no partial effects. Structural problems short-circuit before
//! any simulation work.

use tracing::debug;

use crate::sim::events::{ticks_monotonic, EventError};
use crate::sim::state::GameState;
use crate::sim::step::step;
use crate::verify::checkpoint::{final_checkpoint, is_scheduled};
use crate::verify::session::{
    RejectReason, RunSummary, SessionSubmission, SessionToken, VerificationResult,
};

/// Re-run the simulation from tick zero and compare against the
/// submission. Returns a structured verdict; never panics.
pub fn replay_run(token: &SessionToken, submission: &SessionSubmission) -> VerificationResult {
    let config = &token.config;

    // Structural: the whole log must be tick-ordered before anything runs
    if !ticks_monotonic(&submission.events) {
        return VerificationResult::rejected(RejectReason::TicksNotMonotonic);
    }
    if !submission.checkpoints.ticks_strictly_increasing() {
        return VerificationResult::rejected(RejectReason::TicksNotMonotonic);
    }

    // Every audit tick must carry a submitted checkpoint and lie on the
    // schedule within the declared run. Fail fast before replaying.
    for &audit_tick in &token.audit_ticks {
        let usable = audit_tick <= submission.end_tick
            && is_scheduled(audit_tick, config)
            && submission.checkpoints.find(audit_tick).is_some();
        if !usable {
            return VerificationResult::rejected(RejectReason::AuditTickMissing { tick: audit_tick });
        }
    }

    // Fresh simulation from seed + config; the submission's checkpoints
    // are never a source of truth, only a claim to test.
    let mut state = GameState::new(*token.session_id.as_bytes(), token.seed, config, token.mode);

    let events = &submission.events;
    let mut event_idx = 0usize;

    for _ in 0..submission.end_tick {
        let next_tick = state.tick + 1;

        // Events for this tick: ties resolve in log order
        let start = event_idx;
        while event_idx < events.len() && events[event_idx].tick == next_tick {
            event_idx += 1;
        }
        let tick_events = &events[start..event_idx];

        let outcome = match step(&mut state, tick_events, config) {
            Ok(outcome) => outcome,
            Err(violation) => {
                // Semantic rejection: state has diverged from anything the
                // client could legally have computed. Nothing is skipped.
                return VerificationResult::rejected(RejectReason::InvalidEvent {
                    tick: next_tick,
                    violation,
                });
            }
        };

        if let Some(replayed) = outcome.checkpoint {
            if token.audit_ticks.contains(&replayed.tick) {
                let Some(submitted) = submission.checkpoints.find(replayed.tick) else {
                    return VerificationResult::rejected(RejectReason::AuditTickMissing {
                        tick: replayed.tick,
                    });
                };
                // Zero tolerance on both hashes
                if submitted.hash != replayed.hash || submitted.chain != replayed.chain {
                    debug!(
                        tick = replayed.tick,
                        submitted_hash = submitted.hash,
                        replayed_hash = replayed.hash,
                        "checkpoint divergence"
                    );
                    return VerificationResult::rejected(RejectReason::CheckpointMismatch {
                        tick: replayed.tick,
                    });
                }
            }
        }
    }

    // Events that never applied: tick 0, or time the run never simulated
    if event_idx < events.len() {
        return VerificationResult::rejected(RejectReason::InvalidEvent {
            tick: events[event_idx].tick,
            violation: EventError::TickInThePast,
        });
    }

    // Final tick: exact equality, zero tolerance
    let replayed_final = final_checkpoint(&state);
    if submission.final_checkpoint.tick != replayed_final.tick
        || submission.final_checkpoint.hash != replayed_final.hash
        || submission.final_checkpoint.chain != replayed_final.chain
    {
        return VerificationResult::rejected(RejectReason::FinalHashMismatch);
    }

    // Score: small absolute tolerance absorbs legitimate rounding paths
    if (state.score - submission.claimed_score).abs() > config.score_tolerance {
        return VerificationResult::rejected(RejectReason::ScoreMismatch);
    }

    VerificationResult::accepted(state.score, RunSummary::from_state(&state))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::sim::config::ConfigSnapshot;
    use crate::sim::events::{EventKind, PlayerEvent};
    use crate::sim::state::GameMode;
    use crate::sim::step::run_scripted;
    use crate::SIM_VERSION;

    fn token_with_audits(audit_ticks: Vec<u32>) -> SessionToken {
        SessionToken::issue(
            Uuid::from_bytes([8; 16]),
            [2; 16],
            &[3; 32],
            GameMode::Campaign,
            ConfigSnapshot::default(),
            audit_ticks,
            Utc::now(),
        )
    }

    fn honest_submission(token: &SessionToken, ticks: u32) -> SessionSubmission {
        let run = run_scripted(
            *token.session_id.as_bytes(),
            token.seed,
            &token.config,
            token.mode,
            ticks,
        )
        .unwrap();

        SessionSubmission {
            session_id: token.session_id,
            sim_version: SIM_VERSION,
            config_version: token.config.version,
            end_tick: run.state.tick,
            events: run.events,
            checkpoints: run.checkpoints,
            final_checkpoint: run.final_checkpoint,
            claimed_score: run.state.score,
            summary: None,
        }
    }

    #[test]
    fn test_honest_run_verifies() {
        let token = token_with_audits(vec![300, 900]);
        let submission = honest_submission(&token, 1200);

        let result = replay_run(&token, &submission);
        assert!(result.verified, "honest run rejected: {:?}", result.reason);
        assert_eq!(result.score, submission.claimed_score);
        assert_eq!(result.summary.end_tick, 1200);
    }

    #[test]
    fn test_tampered_audit_checkpoint_rejected() {
        let token = token_with_audits(vec![300, 900]);
        let mut submission = honest_submission(&token, 1200);

        // Flip one bit in the hash the client claims for tick 900
        for checkpoint in &mut submission.checkpoints.checkpoints {
            if checkpoint.tick == 900 {
                checkpoint.hash ^= 1;
            }
        }

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::CheckpointMismatch { tick: 900 }));
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_missing_audit_tick_rejected() {
        // Submission omits the checkpoint for one listed audit tick,
        // even though every other checkpoint matches.
        let token = token_with_audits(vec![300, 900]);
        let mut submission = honest_submission(&token, 1200);
        submission.checkpoints.checkpoints.retain(|c| c.tick != 900);

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::AuditTickMissing { tick: 900 }));
    }

    #[test]
    fn test_audit_tick_beyond_end_rejected() {
        let token = token_with_audits(vec![300, 3000]);
        let submission = honest_submission(&token, 1200);

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::AuditTickMissing { tick: 3000 }));
    }

    #[test]
    fn test_non_monotonic_events_rejected_before_replay() {
        let token = token_with_audits(vec![300]);
        let mut submission = honest_submission(&token, 600);

        submission.events = [10u32, 20, 15]
            .iter()
            .map(|&tick| PlayerEvent { tick, kind: EventKind::RerollChoice { wave: 0 } })
            .collect();

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::TicksNotMonotonic));
    }

    #[test]
    fn test_invalid_event_rejects_whole_submission() {
        let token = token_with_audits(vec![]);
        let mut submission = honest_submission(&token, 600);

        // A choose-relic at tick 2, long before any choice is offered
        submission.events.insert(
            0,
            PlayerEvent { tick: 2, kind: EventKind::ChooseRelic { wave: 0, option_index: 0 } },
        );

        let result = replay_run(&token, &submission);
        assert_eq!(
            result.reason,
            Some(RejectReason::InvalidEvent { tick: 2, violation: EventError::NotInChoiceMode })
        );
    }

    #[test]
    fn test_dropped_event_desyncs_final_hash() {
        let token = token_with_audits(vec![]);
        let mut submission = honest_submission(&token, 3000);
        assert!(!submission.events.is_empty(), "run should contain choices");

        // Drop the last event: the replayed timeline diverges from the
        // one that produced the submitted final hash.
        submission.events.pop();

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::FinalHashMismatch));
    }

    #[test]
    fn test_inflated_score_rejected() {
        let token = token_with_audits(vec![300]);
        let mut submission = honest_submission(&token, 1200);
        submission.claimed_score += token.config.score_tolerance + 1;

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::ScoreMismatch));
    }

    #[test]
    fn test_score_within_tolerance_accepted() {
        let token = token_with_audits(vec![300]);
        let mut submission = honest_submission(&token, 1200);
        submission.claimed_score += token.config.score_tolerance;

        let result = replay_run(&token, &submission);
        assert!(result.verified, "score inside tolerance must pass: {:?}", result.reason);
        // The canonical score is the replayed one, not the claim
        assert_eq!(result.score, submission.claimed_score - token.config.score_tolerance);
    }

    #[test]
    fn test_tampered_final_hash_rejected() {
        let token = token_with_audits(vec![300]);
        let mut submission = honest_submission(&token, 1200);
        submission.final_checkpoint.hash ^= 0x8000_0000;

        let result = replay_run(&token, &submission);
        assert_eq!(result.reason, Some(RejectReason::FinalHashMismatch));
    }

    #[test]
    fn test_event_at_tick_zero_rejected() {
        let token = token_with_audits(vec![]);
        let mut submission = honest_submission(&token, 600);
        submission.events.insert(0, PlayerEvent { tick: 0, kind: EventKind::RerollChoice { wave: 0 } });

        let result = replay_run(&token, &submission);
        assert_eq!(
            result.reason,
            Some(RejectReason::InvalidEvent { tick: 0, violation: EventError::TickInThePast })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        // Determinism end to end: any seed's honest run replays verified
        #[test]
        fn prop_honest_runs_always_verify(entropy in any::<[u8; 32]>()) {
            let token = SessionToken::issue(
                Uuid::from_bytes([8; 16]),
                [2; 16],
                &entropy,
                GameMode::Campaign,
                ConfigSnapshot::default(),
                vec![300],
                Utc::now(),
            );
            let submission = honest_submission(&token, 900);

            let result = replay_run(&token, &submission);
            prop_assert!(result.verified, "rejected with {:?}", result.reason);
            prop_assert_eq!(result.score, submission.claimed_score);
        }
    }
}
