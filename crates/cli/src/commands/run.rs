//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SessionConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::session::{PlayerConfig, SessionPlayer};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading session");

    if !args.config.exists() {
        anyhow::bail!("Session file not found: {}", args.config.display());
    }

    let mut session = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load session from {}", args.config.display()))?;

    let extra_cues = match &args.cues {
        Some(path) => {
            let file = config_loader::ConfigLoader::load_cues_from_path(path)
                .with_context(|| format!("Failed to load cues from {}", path.display()))?;
            info!(path = %path.display(), cues = file.cues.len(), "Cue file loaded");
            file.to_ops()?
        }
        None => Vec::new(),
    };

    // Apply CLI overrides
    if let Some(lookahead) = args.lookahead {
        info!(lookahead, "Overriding lookahead from CLI");
        session.sequencer.lookahead_s = lookahead;
        config_loader::validate_sequencer(&session.sequencer)?;
    }
    if let Some(velocity) = args.velocity {
        info!(velocity, "Overriding velocity from CLI");
        session.motion.velocity = velocity;
    }

    info!(
        cues = session.cues.len() + extra_cues.len(),
        lookahead_s = session.sequencer.lookahead_s,
        position = session.motion.position,
        velocity = session.motion.velocity,
        "Session loaded"
    );

    if args.dry_run {
        info!("Dry run mode - session is valid, exiting");
        print_session_summary(&session, extra_cues.len());
        return Ok(());
    }

    let duration = if args.duration > 0.0 {
        Some(
            Duration::try_from_secs_f64(args.duration)
                .with_context(|| format!("Invalid duration: {}", args.duration))?,
        )
    } else {
        None
    };

    let player = SessionPlayer::new(PlayerConfig {
        session,
        extra_cues,
        duration,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting playback...");
    let stats = player
        .run(setup_shutdown_signal())
        .await
        .context("Playback failed")?;

    info!(
        events = stats.delivery.total_events,
        changes = stats.delivery.changes,
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.2}", stats.event_rate()),
        "Playback completed"
    );
    stats.print_summary();

    info!("Cue Sequencer finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print session summary for dry-run mode
fn print_session_summary(session: &SessionConfig, extra_cues: usize) {
    println!("\n=== Session Summary ===\n");
    println!("Sequencer:");
    println!("  Lookahead: {}s", session.sequencer.lookahead_s);
    println!("  Timer early wake: {}s", session.sequencer.timer.early_s);

    let motion = &session.motion;
    println!("\nMotion:");
    println!(
        "  p={} v={} a={}",
        motion.position, motion.velocity, motion.acceleration
    );
    if let Ok(range) = motion.range() {
        println!("  Range: {}", range);
    }

    println!("\nCues ({}):", session.cues.len());
    for cue in &session.cues {
        match cue.to_op() {
            Ok(op) => match op.interval {
                Some(interval) => println!("  - {} {}", cue.key, interval),
                None => println!("  - {}", cue.key),
            },
            Err(e) => println!("  - {} (invalid: {})", cue.key, e),
        }
    }
    if extra_cues > 0 {
        println!("\nExtra cues from cue file: {}", extra_cues);
    }

    println!();
}
