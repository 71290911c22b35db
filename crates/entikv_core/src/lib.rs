//! # EntiKV Core
//!
//! In-memory transactional key-value storage engine for EntiKV.
//!
//! The engine is layered the way its public API reads:
//! - [`BTree`] - arena-backed B+Tree over raw byte keys and values
//! - [`RecordStore`] / [`RecordId`] - typed record tables over a tree
//! - [`SortedData`] - secondary indexes with composite keys and
//!   unique-constraint enforcement
//! - [`RecoveryUnit`] / [`Session`] - transaction lifecycle with
//!   registered undo changes
//! - [`KvEngine`] - the registry tying stores, indexes, and sessions
//!   together
//! - [`DocumentEngine`] - a CBOR document facade with databases,
//!   collections, and index catalogs
//!
//! ## Example
//!
//! ```rust
//! use entikv_core::{BTreeEngine, EngineConfig, KvEngine, RecordId};
//!
//! let engine = BTreeEngine::new(EngineConfig::default());
//! engine.start().unwrap();
//!
//! let store = engine.create_record_store("testdb.users").unwrap();
//! store.insert_record(&RecordId::from_long(1), b"alice").unwrap();
//! assert_eq!(store.get_record(&RecordId::from_long(1)).unwrap(), b"alice");
//!
//! engine.stop().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod document;
mod engine;
mod error;
mod index;
mod record;
mod session;
mod stats;
mod tree;
mod txn;
mod types;

pub use config::EngineConfig;
pub use document::{Document, DocumentEngine, IndexSpec, ID_FIELD, ID_INDEX_NAME};
pub use engine::{BTreeEngine, KvEngine};
pub use error::{StorageError, StorageResult};
pub use index::key::{composite_key, composite_upper_bound, parse_composite_key};
pub use index::{BTreeIndex, IndexCursor, IndexEntry, SortedData};
pub use record::{BTreeRecordStore, RecordCursor, RecordId, RecordStore};
pub use session::{EngineSession, Session};
pub use stats::{DocumentEngineStats, EngineStats};
pub use tree::BTree;
pub use txn::{Change, EngineRecoveryUnit, RecoveryUnit, SimpleChange, TransactionState};
pub use types::{SessionId, Timestamp};
