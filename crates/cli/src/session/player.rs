//! Session player - wires a local motion, a sequencer and the logging handlers.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CueOp, SessionConfig};
use observability::DeliveryStatsAggregator;
use sequencer::{
    calculate_vector, Clock, EventKind, Handler, LocalMotion, Motion, Notification, Sequencer,
    StaticProvider, TokioClock,
};
use tracing::{info, warn};

use super::PlaybackStats;

/// Player configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Loaded session
    pub session: SessionConfig,

    /// Cues applied after the session cues
    pub extra_cues: Vec<CueOp>,

    /// Playback duration (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Plays one session
pub struct SessionPlayer {
    config: PlayerConfig,
}

impl SessionPlayer {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }

    /// Play until the duration elapses or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PlaybackStats> {
        let session = &self.config.session;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut cues = session.cue_ops().context("Invalid session cues")?;
        cues.extend(self.config.extra_cues.iter().cloned());
        let cue_count = cues.len();

        let clock = Arc::new(TokioClock::new());
        let range = session.motion.range().context("Invalid motion range")?;
        let motion = Arc::new(LocalMotion::new(clock.clone(), range));
        let provider = Arc::new(StaticProvider::new(cues));

        let sequencer = Sequencer::with_config(
            motion.clone(),
            clock.clone(),
            provider,
            &session.sequencer,
        )
        .context("Failed to create sequencer")?;

        info!(
            cues = cue_count,
            lookahead_s = session.sequencer.lookahead_s,
            range = %range,
            "Sequencer ready"
        );

        let delivery = Arc::new(Mutex::new(DeliveryStatsAggregator::new()));
        sequencer.on(EventKind::Events, events_handler(delivery.clone()))?;
        sequencer.on(EventKind::Changes, changes_handler(delivery.clone()))?;

        let setup = &session.motion;
        motion
            .update(
                Some(setup.position),
                Some(setup.velocity),
                Some(setup.acceleration),
            )
            .context("Failed to start motion")?;

        info!(
            position = setup.position,
            velocity = setup.velocity,
            acceleration = setup.acceleration,
            duration_secs = self.config.duration.map(|d| d.as_secs_f64()),
            "Playback started"
        );

        let start_time = Instant::now();
        match self.config.duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        info!("Playback duration reached");
                    }
                    _ = shutdown => {
                        warn!("Received shutdown signal, stopping playback...");
                    }
                }
            }
            None => {
                shutdown.await;
                warn!("Received shutdown signal, stopping playback...");
            }
        }

        let final_position = motion
            .info()
            .map(|info| calculate_vector(&info.vector, clock.now()).position)
            .unwrap_or(setup.position);
        let active_at_end = sequencer
            .active_keys()
            .iter()
            .map(|key| key.to_string())
            .collect();

        sequencer.shutdown().await;
        motion.close();

        let delivery = delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Ok(PlaybackStats {
            duration: start_time.elapsed(),
            cue_count,
            active_at_end,
            final_position,
            delivery,
        })
    }
}

fn events_handler(delivery: Arc<Mutex<DeliveryStatsAggregator>>) -> Handler {
    Arc::new(move |notification: &Notification| {
        let Notification::Events(events) = notification else {
            return;
        };
        let mut delivery = delivery.lock().unwrap_or_else(PoisonError::into_inner);
        for event in events.iter() {
            info!(
                key = %event.key,
                verb = %event.verb,
                direction = %event.direction,
                point = event.point,
                interval = %event.interval,
                delay_ms = format!("{:.3}", event.delay * 1000.0),
                "Cue {}",
                event.verb
            );
            delivery.update(event);
        }
    })
}

fn changes_handler(delivery: Arc<Mutex<DeliveryStatsAggregator>>) -> Handler {
    Arc::new(move |notification: &Notification| {
        let Notification::Changes(changes) = notification else {
            return;
        };
        for change in changes.iter() {
            info!(
                key = %change.key,
                interval = ?change.interval,
                data = ?change.data,
                "Cue changed"
            );
        }
        delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_changes(changes.len());
    })
}
