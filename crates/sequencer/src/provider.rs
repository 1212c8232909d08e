//! Injected cue data source.

use std::collections::HashMap;
use std::fmt::Debug;

use contracts::{CueData, CueKey, CueOp};

/// Supplies the initial cue batch and resolves cue payloads.
///
/// Data returned by [`DataProvider::get_data`] takes precedence over data
/// stored with the cue.
pub trait DataProvider: Send + Sync + Debug {
    /// Cue batch applied when the sequencer starts.
    fn load(&self) -> Vec<CueOp> {
        Vec::new()
    }

    fn get_data(&self, _key: &CueKey) -> Option<CueData> {
        None
    }
}

/// Provider with no cues and no data overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoData;

impl DataProvider for NoData {}

/// Static cue batch plus a fixed data table.
#[derive(Debug, Default, Clone)]
pub struct StaticProvider {
    cues: Vec<CueOp>,
    data: HashMap<CueKey, CueData>,
}

impl StaticProvider {
    pub fn new(cues: Vec<CueOp>) -> Self {
        Self {
            cues,
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<CueKey>, data: CueData) -> Self {
        self.data.insert(key.into(), data);
        self
    }
}

impl DataProvider for StaticProvider {
    fn load(&self) -> Vec<CueOp> {
        self.cues.clone()
    }

    fn get_data(&self, key: &CueKey) -> Option<CueData> {
        self.data.get(key).cloned()
    }
}
