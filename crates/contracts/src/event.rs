//! Notification contracts emitted by the sequencer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CueData, CueKey, Interval};

/// Role of a position relative to an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    Low,
    Singular,
    High,
    Inside,
    Outside,
}

impl PointType {
    /// Signed weight used when deriving a verb from a crossing.
    pub fn to_int(self) -> i8 {
        match self {
            PointType::Low => -1,
            PointType::Singular => 0,
            PointType::High => 1,
            PointType::Inside => 2,
            PointType::Outside => 3,
        }
    }

    /// Classify `point` against `interval`.
    pub fn classify(point: f64, interval: &Interval) -> Self {
        if interval.is_singular() && point == interval.low() {
            PointType::Singular
        } else if point == interval.low() {
            PointType::Low
        } else if point == interval.high() {
            PointType::High
        } else if interval.low() < point && point < interval.high() {
            PointType::Inside
        } else {
            PointType::Outside
        }
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PointType::Low => "low",
            PointType::Singular => "singular",
            PointType::High => "high",
            PointType::Inside => "inside",
            PointType::Outside => "outside",
        };
        f.write_str(s)
    }
}

/// Transition of a cue relative to the moving position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Enter,
    Exit,
}

impl Verb {
    pub fn from_int(i: i8) -> Option<Self> {
        match i {
            1 => Some(Verb::Enter),
            -1 => Some(Verb::Exit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Enter => "enter",
            Verb::Exit => "exit",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Backwards,
    NoDirection,
    Forwards,
}

impl Direction {
    pub fn to_int(self) -> i8 {
        match self {
            Direction::Backwards => -1,
            Direction::NoDirection => 0,
            Direction::Forwards => 1,
        }
    }

    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Forwards
        } else if value < 0.0 {
            Direction::Backwards
        } else {
            Direction::NoDirection
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Backwards => "backwards",
            Direction::NoDirection => "nodirection",
            Direction::Forwards => "forwards",
        };
        f.write_str(s)
    }
}

/// Enter or exit notification for a single cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerEvent {
    pub key: CueKey,
    pub interval: Interval,
    pub data: Option<CueData>,
    /// Position at which the transition happened
    pub point: f64,
    pub point_type: PointType,
    pub verb: Verb,
    pub direction: Direction,
    /// Clock time the transition was due
    pub due_ts: f64,
    /// Clock time the notification was produced
    pub delivery_ts: f64,
    /// `delivery_ts - due_ts`
    pub delay: f64,
}

impl fmt::Display for SequencerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2}] {} {} {} {} {} delay:{:.4}",
            self.point,
            self.key,
            self.interval,
            self.verb,
            self.direction,
            self.point_type,
            self.delay
        )?;
        if let Some(data) = &self.data {
            write!(f, " {data}")?;
        }
        Ok(())
    }
}

/// Edit of an active cue that did not change its activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueChange {
    pub key: CueKey,
    pub interval: Option<Interval>,
    pub data: Option<CueData>,
}

/// Notification channels a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Ordered batch of enter/exit events
    Events,
    Enter,
    Exit,
    /// One edited active cue
    Change,
    /// Batch of edited active cues
    Changes,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Events,
        EventKind::Enter,
        EventKind::Exit,
        EventKind::Change,
        EventKind::Changes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Events => "events",
            EventKind::Enter => "enter",
            EventKind::Exit => "exit",
            EventKind::Change => "change",
            EventKind::Changes => "changes",
        }
    }

    /// Kinds that receive a replay of the active cues on registration.
    pub fn replays_active(&self) -> bool {
        matches!(self, EventKind::Events | EventKind::Enter)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown notification channel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported event kind: {0}")]
pub struct ParseEventKindError(pub String);

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEventKindError(s.to_string()))
    }
}
