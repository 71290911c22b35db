//! Secondary indexes: composite-key encoding and sorted data interfaces.

pub mod key;
mod sorted;

pub use sorted::{BTreeIndex, IndexCursor, IndexEntry, SortedData};
