//! Immutable real-valued interval with independent endpoint inclusivity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Range on the timeline axis.
///
/// Invariants upheld by every constructor:
/// - `low <= high`, neither bound is NaN
/// - a singular interval (`low == high`) includes both bounds
/// - an infinite bound is always inclusive
///
/// # Examples
/// ```
/// use contracts::Interval;
///
/// let i = Interval::from_bounds(0.0, 5.0).unwrap();
/// assert!(i.covers_point(0.0));
/// assert!(!i.covers_point(5.0));
/// assert_eq!(i.to_string(), "[0.00,5.00>");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalSpec", into = "IntervalSpec")]
pub struct Interval {
    low: f64,
    high: f64,
    low_include: bool,
    high_include: bool,
}

impl Interval {
    /// Create an interval with explicit inclusivity flags.
    ///
    /// Flags are normalized for singular and infinite bounds.
    pub fn new(
        low: f64,
        high: f64,
        low_include: bool,
        high_include: bool,
    ) -> Result<Self, ContractError> {
        if low.is_nan() {
            return Err(ContractError::invalid_interval("low is not a number"));
        }
        if high.is_nan() {
            return Err(ContractError::invalid_interval("high is not a number"));
        }
        if low > high {
            return Err(ContractError::invalid_interval(format!(
                "low > high ({low} > {high})"
            )));
        }
        let (mut low_include, mut high_include) = (low_include, high_include);
        if low == high {
            low_include = true;
            high_include = true;
        }
        if low == f64::NEG_INFINITY {
            low_include = true;
        }
        if high == f64::INFINITY {
            high_include = true;
        }
        Ok(Self {
            low,
            high,
            low_include,
            high_include,
        })
    }

    /// `[low, high>`, the default shape of a cue.
    pub fn from_bounds(low: f64, high: f64) -> Result<Self, ContractError> {
        Self::new(low, high, true, false)
    }

    /// `[low, high]`
    pub fn closed(low: f64, high: f64) -> Result<Self, ContractError> {
        Self::new(low, high, true, true)
    }

    /// `<low, high>`
    pub fn open(low: f64, high: f64) -> Result<Self, ContractError> {
        Self::new(low, high, false, false)
    }

    /// Single point `[x]`.
    pub fn singular(x: f64) -> Result<Self, ContractError> {
        Self::new(x, x, true, true)
    }

    /// The whole axis.
    pub fn unbounded() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            low_include: true,
            high_include: true,
        }
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    pub fn low_include(&self) -> bool {
        self.low_include
    }

    #[inline]
    pub fn high_include(&self) -> bool {
        self.high_include
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn is_singular(&self) -> bool {
        self.low == self.high
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.low.is_finite() && self.high.is_finite()
    }

    pub fn covers_point(&self, x: f64) -> bool {
        if self.low < x && x < self.high {
            return true;
        }
        (self.low_include && x == self.low) || (self.high_include && x == self.high)
    }

    /// True if at least one point is covered by both intervals.
    pub fn overlaps_interval(&self, other: &Interval) -> bool {
        match (self.is_singular(), other.is_singular()) {
            (true, true) => return self.low == other.low,
            (true, false) => return other.covers_point(self.low),
            (false, true) => return self.covers_point(other.low),
            (false, false) => {}
        }
        if self.high < other.low || self.low > other.high {
            return false;
        }
        if self.high == other.low {
            return self.covers_point(other.low) && other.covers_point(self.high);
        }
        if self.low == other.high {
            return self.covers_point(other.high) && other.covers_point(self.low);
        }
        true
    }

    /// True if `other` is a subset of this interval.
    pub fn covers_interval(&self, other: &Interval) -> bool {
        if other.low < self.low || self.high < other.high {
            return false;
        }
        if self.low < other.low && other.high < self.high {
            return true;
        }
        if self.low == other.low && !self.low_include && other.low_include {
            return false;
        }
        if self.high == other.high && !self.high_include && other.high_include {
            return false;
        }
        true
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low_include { '[' } else { '<' };
        let close = if self.high_include { ']' } else { '>' };
        let low = if self.low == f64::NEG_INFINITY {
            "<--".to_string()
        } else {
            format!("{:.2}", self.low)
        };
        if self.is_singular() {
            return write!(f, "{open}{low}{close}");
        }
        let high = if self.high == f64::INFINITY {
            "-->".to_string()
        } else {
            format!("{:.2}", self.high)
        };
        write!(f, "{open}{low},{high}{close}")
    }
}

/// Serialized form of [`Interval`].
///
/// Absent bounds are infinite, so JSON files can express unbounded cues.
/// Absent flags take the `[low, high>` defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_include: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_include: Option<bool>,
}

impl TryFrom<IntervalSpec> for Interval {
    type Error = ContractError;

    fn try_from(spec: IntervalSpec) -> Result<Self, Self::Error> {
        Interval::new(
            spec.low.unwrap_or(f64::NEG_INFINITY),
            spec.high.unwrap_or(f64::INFINITY),
            spec.low_include.unwrap_or(true),
            spec.high_include.unwrap_or(false),
        )
    }
}

impl From<Interval> for IntervalSpec {
    fn from(i: Interval) -> Self {
        Self {
            low: i.low.is_finite().then_some(i.low),
            high: i.high.is_finite().then_some(i.high),
            low_include: Some(i.low_include),
            high_include: Some(i.high_include),
        }
    }
}
