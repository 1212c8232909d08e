//! # Cue Index
//!
//! Indexing structures behind the sequencer:
//! - [`SortedArrayBinary`]: ordered endpoint set with boundary queries
//! - [`MultiMap`]: endpoint → keys reverse map
//! - [`Axis`]: the cue registry composing both
//!
//! ## Example
//!
//! ```
//! use contracts::{CueOp, Interval};
//! use cue_index::Axis;
//!
//! let mut axis = Axis::new();
//! axis.update_all([CueOp::upsert("a", Interval::closed(0.0, 1.0).unwrap(), None)])
//!     .unwrap();
//! assert_eq!(axis.lookup_by_point(Some(1.0)).len(), 1);
//! ```

mod axis;
mod multimap;
mod sorted_array;

pub use axis::Axis;
pub use multimap::MultiMap;
pub use sorted_array::SortedArrayBinary;
