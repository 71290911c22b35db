//! Record stores: record id to document bytes.

use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::record::RecordId;
use crate::tree::BTree;

/// B+Tree order used by record stores.
const STORE_TREE_ORDER: usize = 128;

/// A store of opaque document bytes keyed by [`RecordId`].
///
/// The store treats document payloads as uninterpreted byte strings;
/// encoding and decoding belong to the layers above. One production
/// implementation exists ([`BTreeRecordStore`]); the trait is the seam for
/// substituting an alternative backing store without touching callers.
pub trait RecordStore: Send + Sync {
    /// Returns the `database.collection` namespace this store belongs to.
    fn namespace(&self) -> &str;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for a null id,
    /// [`StorageError::AlreadyExists`] if the id is already stored.
    fn insert_record(&self, record_id: &RecordId, data: &[u8]) -> StorageResult<()>;

    /// Replaces an existing record's bytes.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for a null id,
    /// [`StorageError::NotFound`] if the id is absent.
    fn update_record(&self, record_id: &RecordId, data: &[u8]) -> StorageResult<()>;

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for a null id,
    /// [`StorageError::NotFound`] if the id is absent.
    fn delete_record(&self, record_id: &RecordId) -> StorageResult<()>;

    /// Returns a copy of a record's bytes.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for a null id,
    /// [`StorageError::NotFound`] if the id is absent.
    fn get_record(&self, record_id: &RecordId) -> StorageResult<Vec<u8>>;

    /// Returns a cursor over all records with id `>= start`, in ascending
    /// record-id byte order. A null `start` scans from the minimum.
    fn scan(&self, start: &RecordId) -> StorageResult<RecordCursor>;

    /// Number of stored records, maintained incrementally.
    fn num_records(&self) -> u64;

    /// Total stored payload bytes, maintained incrementally.
    fn data_size(&self) -> u64;

    /// Discards every record and resets both counters.
    ///
    /// No reader observes a partially cleared store.
    fn truncate(&self) -> StorageResult<()>;
}

/// Tree and counters guarded together so counter reads are always
/// consistent with the entries they describe.
#[derive(Debug)]
struct StoreInner {
    tree: BTree,
    num_records: u64,
    data_size: u64,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            tree: BTree::new(STORE_TREE_ORDER),
            num_records: 0,
            data_size: 0,
        }
    }
}

/// The production [`RecordStore`], backed by one [`BTree`] keyed by the
/// canonical record-id bytes.
#[derive(Debug)]
pub struct BTreeRecordStore {
    namespace: String,
    inner: RwLock<StoreInner>,
}

impl BTreeRecordStore {
    /// Creates an empty store for the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            inner: RwLock::new(StoreInner::new()),
        }
    }
}

/// Rejects null ids and yields the canonical key bytes.
fn record_key(record_id: &RecordId) -> StorageResult<Vec<u8>> {
    record_id
        .as_bytes()
        .ok_or_else(|| StorageError::invalid_argument("record id must not be null"))
}

impl RecordStore for BTreeRecordStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn insert_record(&self, record_id: &RecordId, data: &[u8]) -> StorageResult<()> {
        let key = record_key(record_id)?;
        let mut inner = self.inner.write();

        if inner.tree.contains(&key) {
            return Err(StorageError::already_exists(record_id.to_string()));
        }

        inner.tree.insert(&key, data)?;
        inner.num_records += 1;
        inner.data_size += data.len() as u64;
        Ok(())
    }

    fn update_record(&self, record_id: &RecordId, data: &[u8]) -> StorageResult<()> {
        let key = record_key(record_id)?;
        let mut inner = self.inner.write();

        let old = inner
            .tree
            .get(&key)
            .ok_or_else(|| StorageError::not_found(record_id.to_string()))?;
        inner.tree.insert(&key, data)?;

        inner.data_size = inner.data_size - old.len() as u64 + data.len() as u64;
        Ok(())
    }

    fn delete_record(&self, record_id: &RecordId) -> StorageResult<()> {
        let key = record_key(record_id)?;
        let mut inner = self.inner.write();

        let old = inner
            .tree
            .get(&key)
            .ok_or_else(|| StorageError::not_found(record_id.to_string()))?;
        inner.tree.delete(&key)?;

        inner.num_records -= 1;
        inner.data_size -= old.len() as u64;
        Ok(())
    }

    fn get_record(&self, record_id: &RecordId) -> StorageResult<Vec<u8>> {
        let key = record_key(record_id)?;
        self.inner
            .read()
            .tree
            .get(&key)
            .ok_or_else(|| StorageError::not_found(record_id.to_string()))
    }

    fn scan(&self, start: &RecordId) -> StorageResult<RecordCursor> {
        let start_key = match start {
            RecordId::Null => None,
            other => Some(record_key(other)?),
        };

        let entries = self
            .inner
            .read()
            .tree
            .range(start_key.as_deref(), None)
            .into_iter()
            .map(|(key, value)| (RecordId::from_bytes(&key), value))
            .collect();

        Ok(RecordCursor::new(entries))
    }

    fn num_records(&self) -> u64 {
        self.inner.read().num_records
    }

    fn data_size(&self) -> u64 {
        self.inner.read().data_size
    }

    fn truncate(&self) -> StorageResult<()> {
        // Single writer critical section: tree swap and counter reset are
        // never observed separately.
        *self.inner.write() = StoreInner::new();
        Ok(())
    }
}

/// Cursor over a materialized record snapshot.
///
/// The snapshot is taken under the store's read lock while the cursor is
/// built; iterating it afterwards touches no lock.
#[derive(Debug)]
pub struct RecordCursor {
    entries: std::vec::IntoIter<(RecordId, Vec<u8>)>,
}

impl RecordCursor {
    fn new(entries: Vec<(RecordId, Vec<u8>)>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }

    /// Number of entries not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl Iterator for RecordCursor {
    type Item = (RecordId, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
