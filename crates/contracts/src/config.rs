//! Configuration contracts shared across crates.
//!
//! A session file bundles the sequencer tuning, an optional local motion
//! setup and the initial cue batch.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{ContractError, CueData, CueKey, CueOp, Interval, IntervalSpec};

/// Sequencer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SequencerConfig {
    /// Length of the schedule window in seconds
    #[validate(range(exclusive_min = 0.0))]
    pub lookahead_s: f64,

    /// Precision timer tuning
    #[validate(nested)]
    pub timer: TimerConfig,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            lookahead_s: 5.0,
            timer: TimerConfig::default(),
        }
    }
}

/// Precision timer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_long_wait"))]
pub struct TimerConfig {
    /// Wake this long before the deadline and finish with a yield loop
    #[validate(range(min = 0.0, max = 0.1))]
    pub early_s: f64,
    /// Fire once the deadline is this close
    #[validate(range(min = 0.0))]
    pub tolerance_s: f64,
    /// Waits longer than this are split
    #[validate(range(exclusive_min = 0.0))]
    pub long_wait_s: f64,
    /// How early a split long wait wakes up to re-adjust
    #[validate(range(min = 0.0))]
    pub long_wakeup_s: f64,
    /// Yields spent in the residual loop before falling back to a plain sleep
    pub spin_limit: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            early_s: 0.0005,
            tolerance_s: 0.0,
            long_wait_s: 10.0,
            long_wakeup_s: 3.0,
            spin_limit: 256,
        }
    }
}

fn validate_long_wait(timer: &TimerConfig) -> Result<(), ValidationError> {
    if timer.long_wakeup_s >= timer.long_wait_s {
        let mut err = ValidationError::new("long_wakeup_s");
        err.message = Some("long_wakeup_s must be < long_wait_s".into());
        return Err(err);
    }
    Ok(())
}

/// Local motion used to drive a session without an external source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSetup {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// Lower position bound (None = unbounded)
    pub range_low: Option<f64>,
    /// Upper position bound (None = unbounded)
    pub range_high: Option<f64>,
}

impl Default for MotionSetup {
    fn default() -> Self {
        Self {
            position: 0.0,
            velocity: 1.0,
            acceleration: 0.0,
            range_low: None,
            range_high: None,
        }
    }
}

impl MotionSetup {
    /// Closed position range of the motion
    pub fn range(&self) -> Result<Interval, ContractError> {
        Interval::closed(
            self.range_low.unwrap_or(f64::NEG_INFINITY),
            self.range_high.unwrap_or(f64::INFINITY),
        )
    }
}

/// One cue as written in a session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueEntry {
    pub key: CueKey,
    #[serde(flatten)]
    pub interval: IntervalSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CueData>,
}

impl CueEntry {
    pub fn to_op(&self) -> Result<CueOp, ContractError> {
        let interval = Interval::try_from(self.interval)?;
        Ok(CueOp::upsert(self.key.clone(), interval, self.data.clone()))
    }
}

/// Top-level session file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub motion: MotionSetup,
    #[serde(default)]
    pub cues: Vec<CueEntry>,
}

impl SessionConfig {
    /// Cue batch in file order
    pub fn cue_ops(&self) -> Result<Vec<CueOp>, ContractError> {
        self.cues.iter().map(CueEntry::to_op).collect()
    }
}
