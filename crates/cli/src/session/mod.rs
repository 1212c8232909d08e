//! Session playback module.

mod player;
mod stats;

pub use player::{PlayerConfig, SessionPlayer};
pub use stats::PlaybackStats;
