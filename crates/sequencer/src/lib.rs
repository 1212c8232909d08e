//! # Sequencer
//!
//! Emits enter/exit notifications for keyed intervals (cues) as a motion
//! moves along the axis.
//!
//! Responsibilities:
//! - Predict boundary crossings within a look-ahead window
//! - Fire them on time with a precision timer
//! - Re-evaluate the active set on motion changes and cue edits
//! - Fan notifications out to registered handlers, isolating handler panics
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sequencer::{EventKind, Interval, LocalMotion, Notification, Sequencer, TokioClock};
//!
//! let clock = Arc::new(TokioClock::new());
//! let motion = Arc::new(LocalMotion::new(clock.clone(), Interval::unbounded()));
//! let sequencer = Sequencer::new(motion.clone(), clock)?;
//!
//! sequencer.add_cue("intro", Interval::closed(0.0, 10.0)?, None)?;
//! sequencer.on(EventKind::Enter, Arc::new(|n: &Notification| println!("{n:?}")))?;
//!
//! motion.update(Some(0.0), Some(1.0), None)?;
//! ```

mod builder;
mod clock;
mod engine;
mod error;
mod kinematics;
mod motion;
mod provider;
mod registry;
mod schedule;
mod sequencer;
mod timeout;

pub use builder::Request;
pub use clock::{Clock, ManualClock, TokioClock};
pub use engine::{reorder_events, EditBatch, Emission, SequencerEngine};
pub use error::{Result, SequencerError};
pub use kinematics::{
    calculate_vector, direction_at, is_moving, min_positive_real_solution, position_interval,
    range_violation, real_solutions,
};
pub use motion::{LocalMotion, Motion};
pub use provider::{DataProvider, NoData, StaticProvider};
pub use registry::{Delivery, Handler, HandlerToken, Notification, Registry};
pub use schedule::{DueTask, Schedule};
pub use sequencer::Sequencer;
pub use timeout::{PreciseTimer, Timer, TimerFuture};

// Re-export contracts types
pub use contracts::{
    AxisOp, Cue, CueChange, CueData, CueKey, CueOp, Direction, EventKind, Interval, MotionInfo,
    MotionVector, OpType, PointType, ReadyState, SequencerConfig, SequencerEvent, TimerConfig,
    Verb,
};
