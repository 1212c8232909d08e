//! # Contracts
//!
//! Frozen data contracts shared by every crate of the cue sequencer.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are seconds (`f64`) on the sequencer clock
//! - Motion vectors are stamped with the same clock

mod config;
mod cue;
mod cue_key;
mod error;
mod event;
mod interval;
mod motion;

pub use config::*;
pub use cue::*;
pub use cue_key::CueKey;
pub use error::*;
pub use event::*;
pub use interval::{Interval, IntervalSpec};
pub use motion::*;
