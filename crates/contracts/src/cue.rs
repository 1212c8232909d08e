//! Cue contracts: the keyed intervals managed by the axis, and the
//! edit operations applied to them.

use serde::{Deserialize, Serialize};

use crate::{CueKey, Interval, PointType};

/// Opaque payload attached to a cue.
pub type CueData = serde_json::Value;

/// A keyed interval on the axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub key: CueKey,
    pub interval: Interval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CueData>,
}

impl Cue {
    pub fn new(key: impl Into<CueKey>, interval: Interval, data: Option<CueData>) -> Self {
        Self {
            key: key.into(),
            interval,
            data,
        }
    }
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.interval)?;
        if let Some(data) = &self.data {
            write!(f, " {data}")?;
        }
        Ok(())
    }
}

/// A single edit submitted to the axis.
///
/// `interval: None` removes the cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueOp {
    pub key: CueKey,
    #[serde(default)]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CueData>,
}

impl CueOp {
    /// Create or update `key`.
    pub fn upsert(key: impl Into<CueKey>, interval: Interval, data: Option<CueData>) -> Self {
        Self {
            key: key.into(),
            interval: Some(interval),
            data,
        }
    }

    /// Remove `key`.
    pub fn remove(key: impl Into<CueKey>) -> Self {
        Self {
            key: key.into(),
            interval: None,
            data: None,
        }
    }
}

/// Classification of an applied edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Noop,
    Create,
    Update,
    Remove,
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpType::Noop => "noop",
            OpType::Create => "create",
            OpType::Update => "update",
            OpType::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// Result of applying one [`CueOp`] to the axis, in submission order.
///
/// For `Remove` the interval is the one that was removed; a `Noop` on an
/// unknown key carries no interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisOp {
    pub op_type: OpType,
    pub key: CueKey,
    pub interval: Option<Interval>,
    pub data: Option<CueData>,
}

/// An endpoint hit returned by a range lookup on the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PointInfo {
    pub key: CueKey,
    pub interval: Interval,
    pub point: f64,
    pub point_type: PointType,
    pub data: Option<CueData>,
}
