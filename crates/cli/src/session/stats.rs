//! Playback statistics.

use std::time::Duration;

use observability::DeliveryStatsAggregator;

/// Statistics from a playback run
#[derive(Debug, Clone, Default)]
pub struct PlaybackStats {
    /// Wall time spent playing
    pub duration: Duration,

    /// Cues loaded at start
    pub cue_count: usize,

    /// Active cues when playback stopped
    pub active_at_end: Vec<String>,

    /// Final motion position
    pub final_position: f64,

    /// Delivered notifications
    pub delivery: DeliveryStatsAggregator,
}

impl PlaybackStats {
    /// Enter/exit events per second of playback
    pub fn event_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.delivery.total_events as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Playback Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Cues loaded: {}", self.cue_count);
        println!("Final position: {:.3}", self.final_position);
        println!("Event rate: {:.2}/s", self.event_rate());
        if self.active_at_end.is_empty() {
            println!("Active at end: none");
        } else {
            println!("Active at end: {}", self.active_at_end.join(", "));
        }
        println!();
        print!("{}", self.delivery.summary());
        println!();
    }
}
