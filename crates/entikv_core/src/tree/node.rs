//! Node storage for the arena-backed B+Tree.

/// Handle to a node in the owning tree's arena.
///
/// Nodes reference their parent, children, and leaf siblings through these
/// handles instead of pointers; the arena owns every node, so splits never
/// create dangling references or ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId(pub(crate) usize);

/// Payload distinguishing leaf nodes from internal nodes.
#[derive(Debug)]
pub(crate) enum NodePayload {
    /// Leaf node: `values` runs parallel to the node's keys, `next` links the
    /// leaf chain in ascending key order.
    Leaf {
        /// Value for each key, same index.
        values: Vec<Vec<u8>>,
        /// Next leaf to the right, if any.
        next: Option<NodeId>,
    },
    /// Internal node: `children.len() == keys.len() + 1`; every key in
    /// `children[i]` is `< keys[i]`, every key in `children[i + 1]` is
    /// `>= keys[i]`.
    Internal {
        /// Child subtrees bracketing the separator keys.
        children: Vec<NodeId>,
    },
}

/// A single B+Tree node.
///
/// Keys are strictly increasing within a node.
#[derive(Debug)]
pub(crate) struct Node {
    /// Parent handle; `None` only for the root.
    pub(crate) parent: Option<NodeId>,
    /// Separator keys (internal) or entry keys (leaf).
    pub(crate) keys: Vec<Vec<u8>>,
    /// Leaf or internal payload.
    pub(crate) payload: NodePayload,
}

impl Node {
    /// Creates an empty leaf with no siblings.
    pub(crate) fn leaf() -> Self {
        Self {
            parent: None,
            keys: Vec::new(),
            payload: NodePayload::Leaf {
                values: Vec::new(),
                next: None,
            },
        }
    }
}
