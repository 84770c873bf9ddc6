//! Session Boundary
//!
//! The engine's external interface: the token issued at session start
//! (signed by an external token service - issuance and signature checks
//! are not this crate's job) and the submission uploaded at session end.
//!
//! `verify_session` is the single entry point callers use. It runs the
//! structural gates (version, config, payload ceilings) before any
//! simulation work, then dispatches to hash-chain replay (campaign) or
//! the bounds validator (boss rush). Every rejection carries a reason
//! from the closed [`RejectReason`] vocabulary - a stable contract for
//! caller messaging and telemetry.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::hash::Digest256;
use crate::core::rng::derive_session_seed;
use crate::sim::config::ConfigSnapshot;
use crate::sim::events::{EventError, PlayerEvent};
use crate::sim::relic::RelicId;
use crate::sim::state::{GameMode, GameState, ModeState};
use crate::verify::checkpoint::{Checkpoint, CheckpointLog};
use crate::verify::replay::replay_run;
use crate::verify::summary::verify_boss_rush;
use crate::SIM_VERSION;

// =============================================================================
// SESSION TOKEN (inbound at session start)
// =============================================================================

/// Everything the token service binds into a signed session token.
///
/// The engine consumes this after signature verification has already
/// happened upstream; it never sees or checks the signature itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionToken {
    /// Session identifier.
    pub session_id: Uuid,
    /// Player the session was issued to.
    pub player_id: [u8; 16],
    /// RNG seed for the whole session.
    pub seed: u64,
    /// Engine version the session was issued for.
    pub sim_version: u16,
    /// Mode the session runs.
    pub mode: GameMode,
    /// Immutable config snapshot for the session's lifetime.
    pub config: ConfigSnapshot,
    /// Digest binding `config` into the token.
    pub config_digest: Digest256,
    /// Server-chosen ticks that must carry a matching submitted
    /// checkpoint. Always multiples of the checkpoint interval.
    pub audit_ticks: Vec<u32>,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

impl SessionToken {
    /// Build a token the way the external token service does.
    ///
    /// Lives here so the demo binary and tests exercise the same seed
    /// derivation and config binding the real service uses.
    pub fn issue(
        session_id: Uuid,
        player_id: [u8; 16],
        server_entropy: &[u8; 32],
        mode: GameMode,
        config: ConfigSnapshot,
        audit_ticks: Vec<u32>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let seed = derive_session_seed(server_entropy, session_id.as_bytes(), &player_id);
        let config_digest = config.digest();

        Self {
            session_id,
            player_id,
            seed,
            sim_version: SIM_VERSION,
            mode,
            config,
            config_digest,
            audit_ticks,
            issued_at,
        }
    }
}

// =============================================================================
// SESSION SUBMISSION (inbound at session end)
// =============================================================================

/// The client-submitted record of a finished session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSubmission {
    /// Session the submission belongs to.
    pub session_id: Uuid,
    /// Engine version the client ran.
    pub sim_version: u16,
    /// Config version the client played under.
    pub config_version: u32,
    /// Last simulated tick.
    pub end_tick: u32,
    /// Player events in log order.
    pub events: Vec<PlayerEvent>,
    /// Checkpoints recorded during play.
    pub checkpoints: CheckpointLog,
    /// Final-tick checkpoint.
    pub final_checkpoint: Checkpoint,
    /// Score the client claims.
    pub claimed_score: i64,
    /// End-of-run summary (boss rush only).
    pub summary: Option<BossRushSummary>,
}

impl SessionSubmission {
    /// Wire size of the submission: JSON events plus binary checkpoints.
    ///
    /// Used against `max_submission_bytes` to bound replay cost.
    pub fn payload_bytes(&self) -> u64 {
        let events_bytes = serde_json::to_vec(&self.events).map(|v| v.len()).unwrap_or(usize::MAX) as u64;
        events_bytes.saturating_add(self.checkpoints.encoded_size())
    }
}

/// Submitted end-of-run totals for a boss-rush session.
///
/// Fields are i64 on purpose: a tampering client can submit negatives,
/// and the bounds validator must be able to represent and reject them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossRushSummary {
    /// Bosses killed.
    pub bosses_killed: i64,
    /// Highest global boss index reached.
    pub highest_boss_index: i64,
    /// Total damage dealt across the run.
    pub total_damage: i64,
    /// Gold earned (not net of spending).
    pub gold_earned: i64,
    /// Dust earned.
    pub dust_earned: i64,
    /// Milestone materials earned.
    pub materials_earned: i64,
    /// Experience earned.
    pub xp_earned: i64,
    /// Ticks the run lasted.
    pub elapsed_ticks: i64,
    /// Bitmask of achieved milestone ids.
    pub achieved_milestones: u32,
    /// Relics collected, in acquisition order.
    pub collected_relics: Vec<RelicId>,
    /// Fastest boss kill in ticks, if any boss died.
    pub fastest_kill_ticks: Option<u32>,
}

impl BossRushSummary {
    /// Build the canonical summary from a finished boss-rush state.
    /// Returns None for campaign states.
    pub fn from_state(state: &GameState) -> Option<Self> {
        let ModeState::BossRush(rush) = &state.mode else {
            return None;
        };

        Some(Self {
            bosses_killed: rush.bosses_killed as i64,
            highest_boss_index: rush.next_boss_index.saturating_sub(1) as i64,
            total_damage: rush.total_damage,
            gold_earned: state.resources.gold_earned,
            dust_earned: state.resources.dust_earned,
            materials_earned: state.resources.materials_earned,
            xp_earned: rush.xp_earned,
            elapsed_ticks: state.tick as i64,
            achieved_milestones: rush.achieved_milestones,
            collected_relics: state.relics.clone(),
            fastest_kill_ticks: rush.fastest_kill_ticks,
        })
    }

    /// Canonical score for a bounds-verified run.
    pub fn score(&self) -> i64 {
        self.bosses_killed * 1_000 + self.total_damage / 1_000
    }
}

// =============================================================================
// REJECTION TAXONOMY
// =============================================================================

/// Which earned-resource field a negative value was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceField {
    Gold,
    Dust,
    Materials,
    Xp,
}

/// The closed rejection vocabulary.
///
/// Callers treat these as a stable contract; variants are append-only.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Submission or token built against a different engine version.
    #[error("simulation version mismatch")]
    VersionMismatch,
    /// Config snapshot version tag does not match the token's.
    #[error("config snapshot version mismatch")]
    ConfigMismatch,
    /// Event or checkpoint arrays exceed the boundary ceilings.
    #[error("payload exceeds size ceilings")]
    PayloadTooLarge,
    /// Claimed end tick exceeds the replayable session ceiling.
    #[error("session exceeds the tick ceiling")]
    SessionTooLong,
    /// Event ticks regress somewhere in the log.
    #[error("event ticks are not monotonic")]
    TicksNotMonotonic,
    /// An event failed validation during replay.
    #[error("invalid event at tick {tick}: {violation}")]
    InvalidEvent {
        /// Tick of the offending event.
        tick: u32,
        /// The validation failure.
        violation: EventError,
    },
    /// No submitted checkpoint at a server-chosen audit tick.
    #[error("no checkpoint submitted for audit tick {tick}")]
    AuditTickMissing {
        /// The unmatched audit tick.
        tick: u32,
    },
    /// A submitted checkpoint disagrees with the replayed one.
    #[error("checkpoint mismatch at tick {tick}")]
    CheckpointMismatch {
        /// First tick that disagreed.
        tick: u32,
    },
    /// The submitted final hash disagrees with the replayed one.
    #[error("final state hash mismatch")]
    FinalHashMismatch,
    /// Claimed score outside the replay tolerance.
    #[error("claimed score outside tolerance")]
    ScoreMismatch,
    /// Boss-rush submission without the required summary.
    #[error("boss-rush summary missing")]
    SummaryMissing,
    /// Summary total damage negative or above the absolute ceiling.
    #[error("summary damage out of range")]
    DamageOutOfRange,
    /// Summary average damage per boss kill above the ceiling.
    #[error("summary damage per boss exceeded")]
    DamagePerBossExceeded,
    /// Summary kill count negative or above the ceiling.
    #[error("summary kill count out of range")]
    KillCountOutOfRange,
    /// Summary elapsed ticks above the wall-clock-derived ceiling.
    #[error("summary duration exceeded")]
    DurationExceeded,
    /// A summary earned-resource field is negative.
    #[error("summary resource {field:?} is negative")]
    NegativeResource {
        /// The offending field.
        field: ResourceField,
    },
}

// =============================================================================
// VERIFICATION RESULT (outbound)
// =============================================================================

/// Canonical summary of a verified run, for the rewards service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Mode the session ran.
    pub mode: GameMode,
    /// Last simulated tick.
    pub end_tick: u32,
    /// Waves cleared (campaign).
    pub waves_cleared: u32,
    /// Bosses killed (boss rush).
    pub bosses_killed: u32,
    /// Gold earned over the run.
    pub gold_earned: i64,
    /// Dust earned over the run.
    pub dust_earned: i64,
    /// Milestone materials earned.
    pub materials_earned: i64,
    /// Relics collected, in acquisition order.
    pub relics: Vec<RelicId>,
    /// Fortress hit points at session end.
    pub fortress_hp: i64,
    /// Whether the fortress fell.
    pub defeated: bool,
}

impl RunSummary {
    /// Build the canonical summary from a replayed final state.
    pub fn from_state(state: &GameState) -> Self {
        let (mode, waves_cleared, bosses_killed) = match &state.mode {
            ModeState::Campaign(ws) => (GameMode::Campaign, ws.waves_cleared, 0),
            ModeState::BossRush(rush) => (GameMode::BossRush, 0, rush.bosses_killed),
        };

        Self {
            mode,
            end_tick: state.tick,
            waves_cleared,
            bosses_killed,
            gold_earned: state.resources.gold_earned,
            dust_earned: state.resources.dust_earned,
            materials_earned: state.resources.materials_earned,
            relics: state.relics.clone(),
            fortress_hp: state.fortress.hp,
            defeated: state.is_defeated(),
        }
    }
}

/// The only artifact callers persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the session is accepted.
    pub verified: bool,
    /// Rejection reason when not verified.
    pub reason: Option<RejectReason>,
    /// Canonical score (0 on rejection - no partial grants).
    pub score: i64,
    /// Canonical run summary (empty on rejection).
    pub summary: RunSummary,
}

impl VerificationResult {
    /// A terminal rejection. No score, no summary, no partial grant.
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            verified: false,
            reason: Some(reason),
            score: 0,
            summary: RunSummary::default(),
        }
    }

    /// An accepted session with its canonical outputs.
    pub fn accepted(score: i64, summary: RunSummary) -> Self {
        Self {
            verified: true,
            reason: None,
            score,
            summary,
        }
    }
}

/// Result of verifying one session, tagged with its identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Session this report covers.
    pub session_id: Uuid,
    /// When the submission was received.
    pub received_at: DateTime<Utc>,
    /// The verdict.
    pub result: VerificationResult,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Verify a session-end submission against its token.
///
/// Structural gates run first and short-circuit with a specific reason;
/// only then does any simulation work start. Never panics - a structured
/// result always comes back.
pub fn verify_session(
    token: &SessionToken,
    submission: &SessionSubmission,
    received_at: DateTime<Utc>,
) -> VerificationReport {
    let result = verify_inner(token, submission, received_at);

    match &result.reason {
        Some(reason) => info!(
            session = %token.session_id,
            %reason,
            "session rejected"
        ),
        None => info!(
            session = %token.session_id,
            score = result.score,
            "session verified"
        ),
    }

    VerificationReport {
        session_id: token.session_id,
        received_at,
        result,
    }
}

fn verify_inner(
    token: &SessionToken,
    submission: &SessionSubmission,
    received_at: DateTime<Utc>,
) -> VerificationResult {
    let config = &token.config;

    // Version gates: no replay is attempted across engine or config versions
    if submission.sim_version != SIM_VERSION || token.sim_version != SIM_VERSION {
        return VerificationResult::rejected(RejectReason::VersionMismatch);
    }
    if submission.config_version != config.version || token.config_digest != config.digest() {
        return VerificationResult::rejected(RejectReason::ConfigMismatch);
    }

    // Payload ceilings bound worst-case replay CPU and memory
    if submission.events.len() as u32 > config.max_events
        || submission.checkpoints.len() as u32 > config.max_checkpoints
        || submission.payload_bytes() > config.max_submission_bytes
    {
        return VerificationResult::rejected(RejectReason::PayloadTooLarge);
    }

    if submission.end_tick > config.max_session_ticks {
        return VerificationResult::rejected(RejectReason::SessionTooLong);
    }

    debug!(
        session = %token.session_id,
        mode = ?token.mode,
        end_tick = submission.end_tick,
        events = submission.events.len(),
        checkpoints = submission.checkpoints.len(),
        "structural gates passed"
    );

    match token.mode {
        GameMode::Campaign => replay_run(token, submission),
        GameMode::BossRush => verify_boss_rush(token, submission, received_at),
    }
}

// =============================================================================
// TESTS
// =============================================================================
