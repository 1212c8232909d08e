//! Axis - keyed registry of cues with an endpoint index.
//!
//! ## Structure
//! - `map`: key → [`Cue`]
//! - `reverse`: endpoint → keys anchored there ([`MultiMap`])
//! - `index`: distinct endpoints in ascending order ([`SortedArrayBinary`])
//!
//! An endpoint is in `index` iff `reverse` has a binding for it.

use std::collections::HashMap;

use contracts::{AxisOp, ContractError, Cue, CueKey, CueOp, Interval, OpType, PointInfo, PointType};
use tracing::trace;

use crate::multimap::MultiMap;
use crate::sorted_array::SortedArrayBinary;

/// Hashable endpoint value (`-0.0` and `0.0` share a key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey(u64);

impl From<f64> for PointKey {
    fn from(x: f64) -> Self {
        Self((x + 0.0).to_bits())
    }
}

impl PointKey {
    fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// Indexed cue registry.
#[derive(Debug, Clone, Default)]
pub struct Axis {
    map: HashMap<CueKey, Cue>,
    reverse: MultiMap<PointKey, CueKey>,
    index: SortedArrayBinary,
}

impl Axis {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, cue: Cue) {
        let (low, high) = (cue.interval.low(), cue.interval.high());
        for point in [low, high] {
            if !self.reverse.has_key(&PointKey::from(point)) {
                self.index.insert(point);
            }
        }
        self.reverse.insert(PointKey::from(low), cue.key.clone());
        self.reverse.insert(PointKey::from(high), cue.key.clone());
        self.map.insert(cue.key.clone(), cue);
    }

    fn remove(&mut self, key: &CueKey) -> Result<Cue, ContractError> {
        let cue = self.map.remove(key).ok_or_else(|| {
            ContractError::invariant(format!("attempt to remove non-existing key '{key}'"))
        })?;
        for point in [cue.interval.low(), cue.interval.high()] {
            let pk = PointKey::from(point);
            self.reverse.remove(&pk, key);
            if !self.reverse.has_key(&pk) {
                self.index.remove(point);
            }
        }
        Ok(cue)
    }

    /// Apply a batch of edits in order.
    ///
    /// An op without data keeps the data already stored for the key.
    pub fn update_all(
        &mut self,
        ops: impl IntoIterator<Item = CueOp>,
    ) -> Result<Vec<AxisOp>, ContractError> {
        let mut applied = Vec::new();
        for op in ops {
            let CueOp {
                key,
                interval,
                data,
            } = op;
            let existing = self.map.get(&key).map(|cue| cue.interval);

            let axis_op = match (interval, existing) {
                (None, Some(_)) => {
                    let old = self.remove(&key)?;
                    AxisOp {
                        op_type: OpType::Remove,
                        key,
                        interval: Some(old.interval),
                        data: data.or(old.data),
                    }
                }
                (None, None) => AxisOp {
                    op_type: OpType::Noop,
                    key,
                    interval: None,
                    data: None,
                },
                (Some(new), Some(old)) if new == old => {
                    if let (Some(data), Some(cue)) = (&data, self.map.get_mut(&key)) {
                        cue.data = Some(data.clone());
                    }
                    AxisOp {
                        op_type: OpType::Noop,
                        key,
                        interval: Some(old),
                        data,
                    }
                }
                (Some(new), Some(_)) => {
                    let old = self.remove(&key)?;
                    let data = data.or(old.data);
                    self.insert(Cue::new(key.clone(), new, data.clone()));
                    AxisOp {
                        op_type: OpType::Update,
                        key,
                        interval: Some(new),
                        data,
                    }
                }
                (Some(new), None) => {
                    self.insert(Cue::new(key.clone(), new, data.clone()));
                    AxisOp {
                        op_type: OpType::Create,
                        key,
                        interval: Some(new),
                        data,
                    }
                }
            };
            trace!(key = %axis_op.key, op = %axis_op.op_type, "axis op applied");
            applied.push(axis_op);
        }
        Ok(applied)
    }

    /// Cues covering `x` (all cues when `x` is `None`), by linear scan.
    pub fn lookup_by_point(&self, x: Option<f64>) -> Vec<&Cue> {
        self.map
            .values()
            .filter(|cue| x.is_none_or(|x| cue.interval.covers_point(x)))
            .collect()
    }

    /// Every cue endpoint inside `range`, in ascending endpoint order.
    pub fn lookup_by_interval(&self, range: &Interval) -> Vec<PointInfo> {
        let mut res = Vec::new();
        for &point in self.index.lookup(Some(range)) {
            let pk = PointKey::from(point);
            for key in self.reverse.get(&pk) {
                let Some(cue) = self.map.get(key) else {
                    continue;
                };
                res.push(PointInfo {
                    key: key.clone(),
                    interval: cue.interval,
                    point: pk.value(),
                    point_type: PointType::classify(point, &cue.interval),
                    data: cue.data.clone(),
                });
            }
        }
        res
    }

    pub fn point_type(point: f64, interval: &Interval) -> PointType {
        PointType::classify(point, interval)
    }

    pub fn get(&self, key: &str) -> Option<&Cue> {
        self.map.get(key)
    }

    pub fn interval_of(&self, key: &str) -> Option<Interval> {
        self.map.get(key).map(|cue| cue.interval)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CueKey> {
        self.map.keys()
    }

    pub fn items(&self) -> impl Iterator<Item = &Cue> {
        self.map.values()
    }

    /// Distinct endpoints currently indexed.
    pub fn endpoints(&self) -> &[f64] {
        self.index.as_slice()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
