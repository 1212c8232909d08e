//! One-shot precision timer.
//!
//! Coarse sleeps may wake late or early. [`PreciseTimer`] sleeps until just
//! before the deadline, re-arms a shorter sleep when woken early, and covers
//! the residual gap by yielding to the runtime instead of blocking.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use contracts::TimerConfig;
use tokio::time::{sleep, sleep_until, Instant};

/// Future completing at the armed deadline.
///
/// Dropping it cancels the timer.
pub type TimerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Injected timer capability.
pub trait Timer: Send + Sync + Debug {
    fn arm_once(&self, deadline: Instant) -> TimerFuture;
}

#[derive(Debug, Clone)]
pub struct PreciseTimer {
    early: Duration,
    tolerance: Duration,
    long_wait: Duration,
    long_wakeup: Duration,
    spin_limit: u32,
}

impl PreciseTimer {
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            early: Duration::from_secs_f64(config.early_s),
            tolerance: Duration::from_secs_f64(config.tolerance_s),
            long_wait: Duration::from_secs_f64(config.long_wait_s),
            long_wakeup: Duration::from_secs_f64(config.long_wakeup_s),
            spin_limit: config.spin_limit,
        }
    }
}

impl Default for PreciseTimer {
    fn default() -> Self {
        Self::new(&TimerConfig::default())
    }
}

impl Timer for PreciseTimer {
    fn arm_once(&self, deadline: Instant) -> TimerFuture {
        let timer = self.clone();
        Box::pin(async move {
            let mut spins = 0u32;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    return;
                }
                let left = deadline - now;
                if left <= timer.tolerance {
                    return;
                }
                if left > timer.long_wait {
                    // wake well ahead and re-adjust against clock drift
                    sleep(left - timer.long_wakeup).await;
                } else if left > timer.early {
                    sleep_until(deadline - timer.early).await;
                } else if spins < timer.spin_limit {
                    spins += 1;
                    tokio::task::yield_now().await;
                } else {
                    // paused runtimes never advance while we yield
                    sleep_until(deadline).await;
                }
            }
        })
    }
}
