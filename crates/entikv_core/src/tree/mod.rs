//! Arena-backed B+Tree over byte keys.
//!
//! The tree is the ordered store every higher layer is built on: record
//! stores key it by record id bytes, indexes key it by composite keys. It
//! knows nothing about either — keys and values are opaque byte strings.
//!
//! # Structure
//!
//! All nodes live in a single arena (`Vec<Node>`) and reference each other
//! through [`NodeId`] handles, so parent links and the leaf chain never form
//! an ownership cycle. Leaves hold the values and are linked left-to-right
//! in ascending key order; range scans locate the starting leaf once and
//! then walk the chain without re-descending.
//!
//! # Simplifications
//!
//! Deletion removes the key from its leaf but never merges or rebalances:
//! the tree may become sparse but stays correct for lookups and ordered
//! scans. The tree holds no lock of its own; callers wrap it in their own
//! `RwLock` and keep reads shared, structural mutations exclusive.

mod node;

pub(crate) use node::{Node, NodeId, NodePayload};

use crate::error::{StorageError, StorageResult};

/// Minimum supported order; smaller requested orders are clamped up.
const MIN_ORDER: usize = 3;

/// A B+Tree mapping byte keys to byte values.
///
/// `insert` has upsert semantics: the tree itself never rejects a duplicate
/// key, it overwrites and reports the previous value. Uniqueness rules
/// belong to the callers.
#[derive(Debug)]
pub struct BTree {
    /// Node arena; `NodeId`s index into it.
    arena: Vec<Node>,
    /// Current root node.
    root: NodeId,
    /// Maximum keys a node may hold before it must split.
    order: usize,
    /// Number of live entries.
    len: usize,
}

impl BTree {
    /// Creates an empty tree with the given order (clamped to at least 3).
    #[must_use]
    pub fn new(order: usize) -> Self {
        Self {
            arena: vec![Node::leaf()],
            root: NodeId(0),
            order: order.max(MIN_ORDER),
            len: 0,
        }
    }

    /// Returns the number of entries in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or overwrites an entry, returning the previous value for the
    /// key if one existed.
    ///
    /// Both key and value are copied; the tree owns no caller buffers.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for an empty key.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(StorageError::invalid_argument("key must not be empty"));
        }

        let leaf = self.find_leaf(key);
        let previous = self.insert_into_leaf(leaf, key, value);

        if previous.is_none() {
            self.len += 1;
        }
        if self.arena[leaf.0].keys.len() >= self.order {
            self.split_leaf(leaf);
        }

        Ok(previous)
    }

    /// Looks up the value for a key, returning a copy.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if key.is_empty() {
            return None;
        }

        let leaf = &self.arena[self.find_leaf(key).0];
        let values = match &leaf.payload {
            NodePayload::Leaf { values, .. } => values,
            NodePayload::Internal { .. } => unreachable!("find_leaf returns a leaf"),
        };
        leaf.keys
            .iter()
            .position(|k| k.as_slice() == key)
            .map(|i| values[i].clone())
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Removes an entry.
    ///
    /// No merge or rebalance follows the removal.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for an empty key and
    /// [`StorageError::NotFound`] if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_argument("key must not be empty"));
        }

        let leaf = self.find_leaf(key);
        let node = &mut self.arena[leaf.0];
        let Some(pos) = node.keys.iter().position(|k| k.as_slice() == key) else {
            return Err(StorageError::not_found("key"));
        };

        node.keys.remove(pos);
        match &mut node.payload {
            NodePayload::Leaf { values, .. } => {
                values.remove(pos);
            }
            NodePayload::Internal { .. } => unreachable!("find_leaf returns a leaf"),
        }
        self.len -= 1;
        Ok(())
    }

    /// Returns all entries with `start <= key < end` in ascending key order.
    ///
    /// `None` for `start` means "from the minimum key"; `None` for `end`
    /// means "to the maximum key". Entries are materialized copies taken
    /// under the caller's lock, not a live view of the tree.
    #[must_use]
    pub fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();

        let mut current = Some(match start {
            Some(key) if !key.is_empty() => self.find_leaf(key),
            _ => self.first_leaf(),
        });

        while let Some(leaf_id) = current {
            let leaf = &self.arena[leaf_id.0];
            let (values, next) = match &leaf.payload {
                NodePayload::Leaf { values, next } => (values, *next),
                NodePayload::Internal { .. } => unreachable!("leaf chain holds only leaves"),
            };

            for (i, key) in leaf.keys.iter().enumerate() {
                if let Some(start) = start {
                    if key.as_slice() < start {
                        continue;
                    }
                }
                if let Some(end) = end {
                    if key.as_slice() >= end {
                        return out;
                    }
                }
                out.push((key.clone(), values[i].clone()));
            }

            current = next;
        }

        out
    }

    /// Descends from the root to the leaf whose key range covers `key`.
    fn find_leaf(&self, key: &[u8]) -> NodeId {
        let mut id = self.root;
        loop {
            let node = &self.arena[id.0];
            match &node.payload {
                NodePayload::Leaf { .. } => return id,
                NodePayload::Internal { children } => {
                    let mut i = 0;
                    while i < node.keys.len() && key >= node.keys[i].as_slice() {
                        i += 1;
                    }
                    id = children[i];
                }
            }
        }
    }

    /// Returns the leftmost leaf, the head of the leaf chain.
    fn first_leaf(&self) -> NodeId {
        let mut id = self.root;
        loop {
            match &self.arena[id.0].payload {
                NodePayload::Leaf { .. } => return id,
                NodePayload::Internal { children } => id = children[0],
            }
        }
    }

    /// Inserts into a leaf at its sorted position, overwriting an existing
    /// key. Returns the previous value on overwrite.
    fn insert_into_leaf(&mut self, leaf: NodeId, key: &[u8], value: &[u8]) -> Option<Vec<u8>> {
        let node = &mut self.arena[leaf.0];
        let values = match &mut node.payload {
            NodePayload::Leaf { values, .. } => values,
            NodePayload::Internal { .. } => unreachable!("insert target is a leaf"),
        };

        let mut i = 0;
        while i < node.keys.len() && key > node.keys[i].as_slice() {
            i += 1;
        }

        if i < node.keys.len() && node.keys[i].as_slice() == key {
            return Some(std::mem::replace(&mut values[i], value.to_vec()));
        }

        node.keys.insert(i, key.to_vec());
        values.insert(i, value.to_vec());
        None
    }

    /// Allocates a node and returns its handle.
    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.arena.len());
        self.arena.push(node);
        id
    }

    /// Splits an over-full leaf at its midpoint.
    ///
    /// The new right sibling takes the upper half; its first key is promoted
    /// (duplicated) into the parent as the separator.
    fn split_leaf(&mut self, leaf: NodeId) {
        let (upper_keys, upper_values, old_next, parent) = {
            let node = &mut self.arena[leaf.0];
            let mid = node.keys.len() / 2;
            let upper_keys = node.keys.split_off(mid);
            let (upper_values, old_next) = match &mut node.payload {
                NodePayload::Leaf { values, next } => (values.split_off(mid), *next),
                NodePayload::Internal { .. } => unreachable!("split_leaf splits a leaf"),
            };
            (upper_keys, upper_values, old_next, node.parent)
        };

        let promote = upper_keys[0].clone();
        let right = self.alloc(Node {
            parent,
            keys: upper_keys,
            payload: NodePayload::Leaf {
                values: upper_values,
                next: old_next,
            },
        });

        match &mut self.arena[leaf.0].payload {
            NodePayload::Leaf { next, .. } => *next = Some(right),
            NodePayload::Internal { .. } => unreachable!("split_leaf splits a leaf"),
        }

        match parent {
            None => self.grow_root(leaf, promote, right),
            Some(parent) => self.insert_into_parent(parent, promote, right),
        }
    }

    /// Splits an over-full internal node at its midpoint.
    ///
    /// The middle key is promoted without being kept in either half; the new
    /// right sibling takes the keys and children above it.
    fn split_internal(&mut self, node_id: NodeId) {
        let (promote, upper_keys, upper_children, parent) = {
            let node = &mut self.arena[node_id.0];
            let mid = node.keys.len() / 2;
            let mut upper_keys = node.keys.split_off(mid);
            let promote = upper_keys.remove(0);
            let upper_children = match &mut node.payload {
                NodePayload::Internal { children } => children.split_off(mid + 1),
                NodePayload::Leaf { .. } => unreachable!("split_internal splits an internal node"),
            };
            (promote, upper_keys, upper_children, node.parent)
        };

        let right = self.alloc(Node {
            parent,
            keys: upper_keys,
            payload: NodePayload::Internal {
                children: upper_children.clone(),
            },
        });
        for child in upper_children {
            self.arena[child.0].parent = Some(right);
        }

        match parent {
            None => self.grow_root(node_id, promote, right),
            Some(parent) => self.insert_into_parent(parent, promote, right),
        }
    }

    /// Inserts a separator key and its right child into a parent node,
    /// splitting the parent in turn if it overflows.
    fn insert_into_parent(&mut self, parent: NodeId, key: Vec<u8>, right: NodeId) {
        self.arena[right.0].parent = Some(parent);

        let overflow = {
            let node = &mut self.arena[parent.0];
            let mut i = 0;
            while i < node.keys.len() && key.as_slice() > node.keys[i].as_slice() {
                i += 1;
            }
            node.keys.insert(i, key);
            match &mut node.payload {
                NodePayload::Internal { children } => children.insert(i + 1, right),
                NodePayload::Leaf { .. } => unreachable!("parents are internal nodes"),
            }
            node.keys.len() >= self.order
        };

        if overflow {
            self.split_internal(parent);
        }
    }

    /// Replaces the root after a root split, growing the tree by one level.
    fn grow_root(&mut self, left: NodeId, key: Vec<u8>, right: NodeId) {
        let root = self.alloc(Node {
            parent: None,
            keys: vec![key],
            payload: NodePayload::Internal {
                children: vec![left, right],
            },
        });
        self.arena[left.0].parent = Some(root);
        self.arena[right.0].parent = Some(root);
        self.root = root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(order: usize, count: u32) -> BTree {
        let mut tree = BTree::new(order);
        for i in 0..count {
            tree.insert(&i.to_be_bytes(), &i.to_le_bytes()).unwrap();
        }
        tree
    }

    #[test]
    fn insert_and_get() {
        let mut tree = BTree::new(4);
        tree.insert(b"alpha", b"1").unwrap();
        tree.insert(b"beta", b"2").unwrap();

        assert_eq!(tree.get(b"alpha"), Some(b"1".to_vec()));
        assert_eq!(tree.get(b"beta"), Some(b"2".to_vec()));
        assert_eq!(tree.get(b"gamma"), None);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn insert_overwrites_and_reports_previous() {
        let mut tree = BTree::new(4);
        assert_eq!(tree.insert(b"k", b"old").unwrap(), None);
        assert_eq!(tree.insert(b"k", b"new").unwrap(), Some(b"old".to_vec()));

        assert_eq!(tree.get(b"k"), Some(b"new".to_vec()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn empty_key_rejected() {
        let mut tree = BTree::new(4);
        assert!(matches!(
            tree.insert(b"", b"v"),
            Err(StorageError::InvalidArgument { .. })
        ));
        assert!(matches!(
            tree.delete(b""),
            Err(StorageError::InvalidArgument { .. })
        ));
        assert_eq!(tree.get(b""), None);
    }

    #[test]
    fn delete_removes_entry() {
        let mut tree = BTree::new(4);
        tree.insert(b"k", b"v").unwrap();

        tree.delete(b"k").unwrap();
        assert_eq!(tree.get(b"k"), None);
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn delete_missing_key_fails() {
        let mut tree = BTree::new(4);
        assert!(matches!(
            tree.delete(b"missing"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn order_is_clamped() {
        // Order 0 must still behave as a valid tree.
        let mut tree = BTree::new(0);
        for i in 0u32..50 {
            tree.insert(&i.to_be_bytes(), b"v").unwrap();
        }
        assert_eq!(tree.len(), 50);
        assert_eq!(tree.range(None, None).len(), 50);
    }

    #[test]
    fn splits_keep_all_entries_reachable() {
        let tree = filled(4, 500);
        for i in 0u32..500 {
            assert_eq!(
                tree.get(&i.to_be_bytes()),
                Some(i.to_le_bytes().to_vec()),
                "key {i} lost after splits"
            );
        }
    }

    #[test]
    fn range_returns_sorted_unique_keys() {
        let mut tree = BTree::new(4);
        // Insert in descending order to exercise sorted placement.
        for i in (0u32..200).rev() {
            tree.insert(&i.to_be_bytes(), &i.to_le_bytes()).unwrap();
        }

        let all = tree.range(None, None);
        assert_eq!(all.len(), 200);
        for window in all.windows(2) {
            assert!(window[0].0 < window[1].0, "keys out of order");
        }
    }

    #[test]
    fn range_is_half_open() {
        let tree = filled(4, 100);
        let start = 10u32.to_be_bytes();
        let end = 20u32.to_be_bytes();

        let slice = tree.range(Some(&start), Some(&end));
        assert_eq!(slice.len(), 10);
        assert_eq!(slice[0].0, start.to_vec());
        assert_eq!(slice[9].0, 19u32.to_be_bytes().to_vec());
    }

    #[test]
    fn range_with_open_bounds() {
        let tree = filled(4, 100);
        let from = 90u32.to_be_bytes();
        assert_eq!(tree.range(Some(&from), None).len(), 10);

        let to = 10u32.to_be_bytes();
        assert_eq!(tree.range(None, Some(&to)).len(), 10);
    }

    #[test]
    fn range_start_between_keys() {
        let mut tree = BTree::new(4);
        for i in [10u32, 20, 30, 40] {
            tree.insert(&i.to_be_bytes(), b"v").unwrap();
        }

        // 15 is absent; the scan starts at the next key.
        let slice = tree.range(Some(&15u32.to_be_bytes()), None);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].0, 20u32.to_be_bytes().to_vec());
    }

    #[test]
    fn range_survives_deletes() {
        let mut tree = filled(4, 100);
        for i in (0u32..100).step_by(2) {
            tree.delete(&i.to_be_bytes()).unwrap();
        }

        let all = tree.range(None, None);
        assert_eq!(all.len(), 50);
        for (key, _) in &all {
            let n = u32::from_be_bytes([key[0], key[1], key[2], key[3]]);
            assert_eq!(n % 2, 1);
        }
    }

    #[test]
    fn returned_values_are_copies() {
        let mut tree = BTree::new(4);
        tree.insert(b"k", b"v1").unwrap();

        let mut copy = tree.get(b"k").unwrap();
        copy[0] = b'X';
        assert_eq!(tree.get(b"k"), Some(b"v1".to_vec()));
    }

    #[test]
    fn large_tree_matches_model() {
        use std::collections::BTreeMap;

        let mut tree = BTree::new(5);
        let mut model = BTreeMap::new();

        // Deterministic pseudo-random workload: inserts, overwrites, deletes.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        for _ in 0..2000 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let key = ((state >> 16) as u16).to_be_bytes().to_vec();
            let value = (state as u32).to_be_bytes().to_vec();

            if state % 5 == 0 {
                let expected = model.remove(&key);
                let got = tree.delete(&key);
                assert_eq!(expected.is_some(), got.is_ok());
            } else {
                let previous = model.insert(key.clone(), value.clone());
                assert_eq!(tree.insert(&key, &value).unwrap(), previous);
            }
        }

        let expected: Vec<_> = model.into_iter().collect();
        assert_eq!(tree.range(None, None), expected);
        assert_eq!(tree.len(), expected.len());
    }
}
