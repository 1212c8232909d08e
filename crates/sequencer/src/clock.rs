//! Sequencer time source.

use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Monotonic clock in seconds.
///
/// Motion vectors must be stamped with the same clock the sequencer reads.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> f64;

    /// Runtime instant corresponding to clock time `ts`.
    fn instant_at(&self, ts: f64) -> Instant {
        let ahead = (ts - self.now()).max(0.0);
        Instant::now() + Duration::from_secs_f64(ahead)
    }
}

/// Clock anchored on a tokio [`Instant`].
///
/// Follows tokio's paused time in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch: Instant,
    offset: f64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::with_offset(0.0)
    }

    /// Clock reading `offset` seconds at creation.
    pub fn with_offset(offset: f64) -> Self {
        Self {
            epoch: Instant::now(),
            offset,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.offset + self.epoch.elapsed().as_secs_f64()
    }

    fn instant_at(&self, ts: f64) -> Instant {
        let since_epoch = (ts - self.offset).max(0.0);
        self.epoch + Duration::from_secs_f64(since_epoch)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
