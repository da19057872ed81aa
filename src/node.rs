//! B-tree node layout.
//!
//! A node holds up to `2M` ordered key/value entries and, when internal, one
//! child reference per key gap (`key_count + 1` children). Entries live in
//! bounded vectors sized for one transient overflow entry, so an inserting
//! caller may briefly push a node to `2M + 1` entries before splitting it.
//! There are no null key slots: `keys.len()` *is* the live key count.
//!
//! Nodes never own each other directly. Children are [`NodeId`] indices into
//! the arena, and `parent` is a non-owning back-index used only to navigate
//! upward during split and rebalance propagation.

use std::cmp::Ordering;

use crate::arena::NodeId;
use crate::key;

/// Branching parameter: minimum key count for every non-root node.
///
/// A node holds at most `2 * M` keys and, when internal, at most
/// `2 * M + 1` children. Fixed at compile time.
pub const M: usize = 2;

/// Maximum number of keys a node may hold after an operation completes.
pub const MAX_KEYS: usize = 2 * M;

/// Maximum number of children an internal node may hold.
pub const MAX_CHILDREN: usize = 2 * M + 1;

/// Where a probe key landed within one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The probe key is present at this entry index.
    Found(usize),
    /// The probe key is absent here; if the node is internal, descend into
    /// the child at this index (the child to the right of the last key
    /// less than the probe). If the node is a leaf, this is the sorted
    /// insertion position.
    Child(usize),
}

/// One B-tree node: ordered entries plus child links.
#[derive(Debug)]
pub(crate) struct Node {
    /// Strictly increasing keys, at most `MAX_KEYS` (+1 transiently).
    pub keys: Vec<Box<[u8]>>,
    /// Payloads, index-aligned with `keys`.
    pub values: Vec<Box<[u8]>>,
    /// Child node indices; empty iff `is_leaf`.
    pub children: Vec<NodeId>,
    /// Non-owning back-reference to the owning internal node.
    pub parent: Option<NodeId>,
    /// True iff the node has no children.
    pub is_leaf: bool,
}

impl Node {
    /// Create an empty, detached leaf.
    pub fn leaf() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_KEYS + 1),
            values: Vec::with_capacity(MAX_KEYS + 1),
            children: Vec::new(),
            parent: None,
            is_leaf: true,
        }
    }

    /// Create an empty, detached internal node.
    pub fn internal() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_KEYS + 1),
            values: Vec::with_capacity(MAX_KEYS + 1),
            children: Vec::with_capacity(MAX_CHILDREN + 1),
            parent: None,
            is_leaf: false,
        }
    }

    /// Number of live key/value entries.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Scan entries left to right and classify the probe key.
    ///
    /// Single pass shared by search, upsert, and delete descent: an equal
    /// key short-circuits as [`Slot::Found`]; the first key greater than the
    /// probe decides the child slot; a probe above every key falls through
    /// to the last child slot.
    pub fn locate(&self, probe: &[u8]) -> Slot {
        for (i, k) in self.keys.iter().enumerate() {
            match key::compare(probe, k) {
                Ordering::Less => return Slot::Child(i),
                Ordering::Equal => return Slot::Found(i),
                Ordering::Greater => {}
            }
        }
        Slot::Child(self.keys.len())
    }

    /// Child at `idx`, failing fast on malformed structure.
    ///
    /// The descent algorithms only ever compute child slots that a
    /// well-formed internal node must populate; a miss here means the tree
    /// is corrupt and the operation must not continue.
    pub fn child(&self, idx: usize) -> NodeId {
        match self.children.get(idx) {
            Some(&c) => c,
            None => panic!(
                "invariant violation: internal node has {} children, descent needs slot {idx}",
                self.children.len()
            ),
        }
    }

    /// Position of `child` among this node's children (linear scan).
    pub fn child_index(&self, child: NodeId) -> usize {
        match self.children.iter().position(|&c| c == child) {
            Some(idx) => idx,
            None => panic!("invariant violation: node {child:?} not linked to its parent"),
        }
    }

    /// Remove and return the last key/value entry.
    pub fn pop_last_entry(&mut self) -> (Box<[u8]>, Box<[u8]>) {
        match (self.keys.pop(), self.values.pop()) {
            (Some(k), Some(v)) => (k, v),
            _ => panic!("invariant violation: pop_last_entry on empty node"),
        }
    }

    /// Remove and return the last child reference.
    pub fn pop_last_child(&mut self) -> NodeId {
        match self.children.pop() {
            Some(c) => c,
            None => panic!("invariant violation: pop_last_child on childless node"),
        }
    }
}
