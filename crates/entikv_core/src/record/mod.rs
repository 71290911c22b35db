//! Record identifiers and the record store built on the B+Tree.

mod id;
mod store;

pub use id::RecordId;
pub use store::{BTreeRecordStore, RecordCursor, RecordStore};
