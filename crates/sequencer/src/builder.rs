//! Batched cue edits.

use contracts::{AxisOp, CueData, CueKey, CueOp, Interval};
use indexmap::IndexMap;

use crate::error::Result;
use crate::sequencer::Sequencer;

/// Collects cue edits and submits them as one `update_all` batch.
///
/// A later edit of the same key replaces the earlier one but keeps its
/// position in the batch.
#[derive(Debug)]
pub struct Request<'a> {
    sequencer: &'a Sequencer,
    ops: IndexMap<CueKey, CueOp>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(sequencer: &'a Sequencer) -> Self {
        Self {
            sequencer,
            ops: IndexMap::new(),
        }
    }

    pub fn add_cue(
        &mut self,
        key: impl Into<CueKey>,
        interval: Interval,
        data: Option<CueData>,
    ) -> &mut Self {
        let op = CueOp::upsert(key, interval, data);
        self.ops.insert(op.key.clone(), op);
        self
    }

    /// `data` is reported with the removal instead of the stored data.
    pub fn remove_cue(&mut self, key: impl Into<CueKey>, data: Option<CueData>) -> &mut Self {
        let mut op = CueOp::remove(key);
        op.data = data;
        self.ops.insert(op.key.clone(), op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Submit and reset the request.
    pub fn submit(&mut self) -> Result<Vec<AxisOp>> {
        let ops: Vec<CueOp> = std::mem::take(&mut self.ops).into_values().collect();
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        self.sequencer.update_all(ops)
    }
}
