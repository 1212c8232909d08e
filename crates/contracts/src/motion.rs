//! Motion contracts consumed by the sequencer.

use serde::{Deserialize, Serialize};

use crate::Interval;

/// Kinematic state sampled at `timestamp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionVector {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// Clock time (seconds) the vector is valid at
    pub timestamp: f64,
}

impl MotionVector {
    pub fn new(position: f64, velocity: f64, acceleration: f64, timestamp: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            timestamp,
        }
    }
}

/// Snapshot of a motion: its current vector and allowed position range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionInfo {
    pub vector: MotionVector,
    /// Closed position range; unbounded when the motion has none
    #[serde(default)]
    pub range: Interval,
}

impl MotionInfo {
    pub fn new(vector: MotionVector, range: Interval) -> Self {
        Self { vector, range }
    }
}

/// Lifecycle of a motion source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// No vector available yet
    #[default]
    Init,
    Open,
    /// Terminal
    Closed,
}
