//! Emberhold Engine
//!
//! Headless demonstration binary: plays scripted sessions, submits them
//! to the verifier, and shows both acceptance and tamper rejection.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use emberhold::{SIM_VERSION, TICK_RATE, VERSION};
use emberhold::sim::config::ConfigSnapshot;
use emberhold::sim::state::{GameMode, ModeState};
use emberhold::sim::step::run_scripted;
use emberhold::verify::session::{BossRushSummary, SessionSubmission, SessionToken, verify_session};

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Emberhold Engine v{}", VERSION);
    info!("Sim Version: {}", SIM_VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    demo_campaign()?;
    demo_boss_rush()?;

    Ok(())
}

/// Fresh per-session entropy, as the token service would draw it.
fn fresh_entropy() -> [u8; 32] {
    let mut entropy = [0u8; 32];
    entropy[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    entropy[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    entropy
}

/// Play and verify a campaign session, then show tamper rejection.
fn demo_campaign() -> Result<()> {
    info!("=== Campaign Session ===");

    let config = ConfigSnapshot::default();
    let token = SessionToken::issue(
        Uuid::new_v4(),
        *Uuid::new_v4().as_bytes(),
        &fresh_entropy(),
        GameMode::Campaign,
        config,
        vec![300, 900, 1500],
        Utc::now(),
    );

    info!("Session: {}", token.session_id);
    info!("Seed: {}", token.seed);
    info!("Config digest: {}", hex::encode(&token.config_digest[..8]));

    // The client plays for one minute of simulated time
    let run = run_scripted(*token.session_id.as_bytes(), token.seed, &token.config, token.mode, 1800)?;

    if let ModeState::Campaign(waves) = &run.state.mode {
        info!(
            "Played {} ticks: {} waves cleared, {} relics, score {}",
            run.state.tick,
            waves.waves_cleared,
            run.state.relics.len(),
            run.state.score
        );
    }

    let submission = SessionSubmission {
        session_id: token.session_id,
        sim_version: SIM_VERSION,
        config_version: token.config.version,
        end_tick: run.state.tick,
        events: run.events.clone(),
        checkpoints: run.checkpoints.clone(),
        final_checkpoint: run.final_checkpoint,
        claimed_score: run.state.score,
        summary: None,
    };
    info!(
        "Submission: {} events, {} checkpoints, {} bytes",
        submission.events.len(),
        submission.checkpoints.len(),
        submission.payload_bytes()
    );

    let report = verify_session(&token, &submission, Utc::now());
    info!(
        "Honest submission: verified={} score={}",
        report.result.verified, report.result.score
    );

    // A tampered copy claims a better score
    let mut tampered = submission;
    tampered.claimed_score += 500;
    let report = verify_session(&token, &tampered, Utc::now());
    info!(
        "Tampered submission: verified={} reason={:?}",
        report.result.verified, report.result.reason
    );

    Ok(())
}

/// Play and verify a boss-rush session, then show a bound rejection.
fn demo_boss_rush() -> Result<()> {
    info!("=== Boss-Rush Session ===");

    let config = ConfigSnapshot::default();
    let issued_at = Utc::now() - Duration::minutes(3);
    let token = SessionToken::issue(
        Uuid::new_v4(),
        *Uuid::new_v4().as_bytes(),
        &fresh_entropy(),
        GameMode::BossRush,
        config,
        vec![],
        issued_at,
    );

    let run = run_scripted(*token.session_id.as_bytes(), token.seed, &token.config, token.mode, 4000)?;

    if let ModeState::BossRush(rush) = &run.state.mode {
        info!(
            "Played {} ticks: {} bosses killed (cycle {}), {} total damage, {} purchases",
            run.state.tick,
            rush.bosses_killed,
            rush.cycle,
            rush.total_damage,
            rush.purchases.len()
        );
    }

    let summary = BossRushSummary::from_state(&run.state)
        .ok_or_else(|| anyhow::anyhow!("boss-rush run produced no summary"))?;

    let submission = SessionSubmission {
        session_id: token.session_id,
        sim_version: SIM_VERSION,
        config_version: token.config.version,
        end_tick: run.state.tick,
        events: run.events.clone(),
        checkpoints: run.checkpoints.clone(),
        final_checkpoint: run.final_checkpoint,
        claimed_score: summary.score(),
        summary: Some(summary.clone()),
    };

    let report = verify_session(&token, &submission, Utc::now());
    info!(
        "Honest summary: verified={} score={}",
        report.result.verified, report.result.score
    );

    // A forged summary with an impossible damage average
    let mut forged = submission;
    let mut forged_summary = summary;
    forged_summary.total_damage = 100_000_000;
    forged_summary.bosses_killed = 5;
    forged.summary = Some(forged_summary);
    let report = verify_session(&token, &forged, Utc::now());
    info!(
        "Forged summary: verified={} reason={:?}",
        report.result.verified, report.result.reason
    );

    Ok(())
}
