//! Motion source abstraction and an in-process implementation.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{Interval, MotionInfo, MotionVector, ReadyState};
use tokio::sync::watch;
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Result, SequencerError};
use crate::kinematics::calculate_vector;

/// Kinematic source driving a sequencer.
///
/// Every change bumps the generation counter published by
/// [`Motion::subscribe`]. The sequencer never mutates the motion.
pub trait Motion: Send + Sync + Debug {
    /// Current vector and range; `None` until the first vector exists.
    fn info(&self) -> Option<MotionInfo>;

    fn ready_state(&self) -> ReadyState;

    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[derive(Debug)]
struct LocalState {
    vector: Option<MotionVector>,
    range: Interval,
    ready_state: ReadyState,
}

/// Motion driven directly by local calls to [`LocalMotion::update`].
#[derive(Debug)]
pub struct LocalMotion {
    clock: Arc<dyn Clock>,
    state: Mutex<LocalState>,
    changes: watch::Sender<u64>,
}

impl LocalMotion {
    /// Motion without a vector yet (`ReadyState::Init`).
    pub fn new(clock: Arc<dyn Clock>, range: Interval) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            clock,
            state: Mutex::new(LocalState {
                vector: None,
                range,
                ready_state: ReadyState::Init,
            }),
            changes,
        }
    }

    /// Motion already open at rest at `position`.
    pub fn at_rest(clock: Arc<dyn Clock>, position: f64) -> Result<Self> {
        let motion = Self::new(clock, Interval::unbounded());
        motion.update(Some(position), Some(0.0), Some(0.0))?;
        Ok(motion)
    }

    /// Change any of position, velocity and acceleration, effective now.
    ///
    /// Unspecified components continue from the current vector.
    pub fn update(
        &self,
        position: Option<f64>,
        velocity: Option<f64>,
        acceleration: Option<f64>,
    ) -> Result<MotionVector> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.ready_state == ReadyState::Closed {
            return Err(SequencerError::MotionClosed);
        }
        let current = state
            .vector
            .map(|v| calculate_vector(&v, now))
            .unwrap_or(MotionVector::new(0.0, 0.0, 0.0, now));
        let vector = MotionVector::new(
            position.unwrap_or(current.position),
            velocity.unwrap_or(current.velocity),
            acceleration.unwrap_or(current.acceleration),
            now,
        );
        if [vector.position, vector.velocity, vector.acceleration]
            .iter()
            .any(|x| !x.is_finite())
        {
            return Err(SequencerError::invalid_motion("components must be finite"));
        }
        if !state.range.covers_point(vector.position) {
            return Err(SequencerError::invalid_motion(format!(
                "position {} outside range {}",
                vector.position, state.range
            )));
        }
        state.vector = Some(vector);
        state.ready_state = ReadyState::Open;
        drop(state);

        debug!(
            position = vector.position,
            velocity = vector.velocity,
            acceleration = vector.acceleration,
            "motion updated"
        );
        self.changes.send_modify(|generation| *generation += 1);
        Ok(vector)
    }

    /// Terminal; subscribers see one last change.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.ready_state == ReadyState::Closed {
            return;
        }
        state.ready_state = ReadyState::Closed;
        drop(state);
        self.changes.send_modify(|generation| *generation += 1);
    }
}

impl Motion for LocalMotion {
    fn info(&self) -> Option<MotionInfo> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.vector.map(|vector| MotionInfo::new(vector, state.range))
    }

    fn ready_state(&self) -> ReadyState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ready_state
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
