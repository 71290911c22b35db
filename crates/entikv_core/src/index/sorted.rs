//! Sorted data interfaces: secondary indexes over record ids.

use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::index::key::{composite_key, composite_upper_bound, parse_composite_key};
use crate::record::RecordId;
use crate::tree::BTree;

/// B+Tree order used by index trees.
const INDEX_TREE_ORDER: usize = 128;

/// An ordered mapping from application keys to record ids.
///
/// Entries are stored under composite keys (see [`crate::index::key`]) so a
/// non-unique index can hold many record ids per application key while
/// range scans stay ordered by the key prefix. One production
/// implementation exists ([`BTreeIndex`]); the trait is the substitution
/// seam for alternative backing stores.
pub trait SortedData: Send + Sync {
    /// Returns the index name.
    fn name(&self) -> &str;

    /// Returns true if the index enforces key uniqueness.
    fn is_unique(&self) -> bool;

    /// Inserts an entry for `(key, record_id)`.
    ///
    /// For a unique index the existence check and the insert happen under
    /// one writer lock: a rejected insert performs no mutation.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for an empty key or null id,
    /// [`StorageError::UniqueConstraintViolation`] if a unique index
    /// already holds an entry for `key`.
    fn insert(&self, key: &[u8], record_id: &RecordId) -> StorageResult<()>;

    /// Removes the entry for `(key, record_id)`.
    ///
    /// Removal is not idempotent: a missing entry surfaces as
    /// [`StorageError::NotFound`].
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for an empty key or null id,
    /// [`StorageError::NotFound`] if the entry is absent.
    fn remove(&self, key: &[u8], record_id: &RecordId) -> StorageResult<()>;

    /// Returns a cursor over the entries whose application key is exactly
    /// `key`, ascending by record id.
    fn seek(&self, key: &[u8]) -> StorageResult<IndexCursor>;

    /// Returns a cursor over all entries with application keys in
    /// `[start, end)`. `None` bounds are open.
    fn seek_range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> StorageResult<IndexCursor>;

    /// Number of stored entries, maintained incrementally.
    fn num_entries(&self) -> u64;

    /// Returns true if the index holds no entries.
    fn is_empty(&self) -> bool {
        self.num_entries() == 0
    }

    /// Discards every entry and resets the counter.
    fn clear(&self) -> StorageResult<()>;
}

/// One index entry as decoded from its composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The application key.
    pub key: Vec<u8>,
    /// The record the entry points at.
    pub record_id: RecordId,
}

#[derive(Debug)]
struct IndexInner {
    tree: BTree,
    num_entries: u64,
}

impl IndexInner {
    fn new() -> Self {
        Self {
            tree: BTree::new(INDEX_TREE_ORDER),
            num_entries: 0,
        }
    }

    /// Decoded entries for the exact key, read under the caller's lock.
    ///
    /// The bounded scan `[composite(key, Null), composite(key ++ 0xFF,
    /// Null))` also admits same-length keys sorting after `key`, so the
    /// decoded keys are filtered for equality with the probe.
    fn exact_matches(&self, key: &[u8]) -> StorageResult<Vec<IndexEntry>> {
        let lower = composite_key(key, &RecordId::null());
        let upper = composite_upper_bound(key);

        let mut entries = Vec::new();
        for (composite, _) in self.tree.range(Some(&lower), Some(&upper)) {
            let (entry_key, record_id) = parse_composite_key(&composite)?;
            if entry_key == key {
                entries.push(IndexEntry {
                    key: entry_key,
                    record_id,
                });
            }
        }
        Ok(entries)
    }
}

/// The production [`SortedData`], backed by one [`BTree`] of composite keys.
///
/// The stored value is the record-id bytes again, letting cursors decode an
/// entry without re-parsing the composite suffix.
#[derive(Debug)]
pub struct BTreeIndex {
    name: String,
    unique: bool,
    inner: RwLock<IndexInner>,
}

impl BTreeIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            unique,
            inner: RwLock::new(IndexInner::new()),
        }
    }
}

/// Validates the argument pair shared by insert and remove.
fn check_entry_args(key: &[u8], record_id: &RecordId) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_argument("index key must not be empty"));
    }
    if record_id.is_null() {
        return Err(StorageError::invalid_argument("record id must not be null"));
    }
    Ok(())
}

impl SortedData for BTreeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_unique(&self) -> bool {
        self.unique
    }

    fn insert(&self, key: &[u8], record_id: &RecordId) -> StorageResult<()> {
        check_entry_args(key, record_id)?;
        let mut inner = self.inner.write();

        if self.unique && !inner.exact_matches(key)?.is_empty() {
            return Err(StorageError::unique_violation(key));
        }

        let composite = composite_key(key, record_id);
        let value = record_id
            .as_bytes()
            .ok_or_else(|| StorageError::invalid_argument("record id must not be null"))?;

        // Re-inserting an identical (key, record id) pair overwrites in
        // place and must not inflate the counter.
        if inner.tree.insert(&composite, &value)?.is_none() {
            inner.num_entries += 1;
        }
        Ok(())
    }

    fn remove(&self, key: &[u8], record_id: &RecordId) -> StorageResult<()> {
        check_entry_args(key, record_id)?;
        let mut inner = self.inner.write();

        let composite = composite_key(key, record_id);
        inner
            .tree
            .delete(&composite)
            .map_err(|_| StorageError::not_found(format!("index entry for {record_id}")))?;
        inner.num_entries -= 1;
        Ok(())
    }

    fn seek(&self, key: &[u8]) -> StorageResult<IndexCursor> {
        if key.is_empty() {
            return Err(StorageError::invalid_argument("index key must not be empty"));
        }
        let entries = self.inner.read().exact_matches(key)?;
        Ok(IndexCursor::new(entries))
    }

    fn seek_range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> StorageResult<IndexCursor> {
        let lower = start.map(|key| composite_key(key, &RecordId::null()));
        let upper = end.map(|key| composite_key(key, &RecordId::null()));

        let inner = self.inner.read();
        let mut entries = Vec::new();
        for (composite, _) in inner.tree.range(lower.as_deref(), upper.as_deref()) {
            let (key, record_id) = parse_composite_key(&composite)?;
            entries.push(IndexEntry { key, record_id });
        }
        Ok(IndexCursor::new(entries))
    }

    fn num_entries(&self) -> u64 {
        self.inner.read().num_entries
    }

    fn clear(&self) -> StorageResult<()> {
        *self.inner.write() = IndexInner::new();
        Ok(())
    }
}

/// Cursor over a materialized index snapshot.
#[derive(Debug)]
pub struct IndexCursor {
    entries: std::vec::IntoIter<IndexEntry>,
}

impl IndexCursor {
    fn new(entries: Vec<IndexEntry>) -> Self {
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

impl Iterator for IndexCursor {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
