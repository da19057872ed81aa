//! The B-tree engine and its public locked wrapper.
//!
//! [`TreeCore`] is the unsynchronized engine: root-to-leaf descent, upsert
//! with split propagation, delete with predecessor swap and borrow/merge
//! rebalancing, the structure dump, and the invariant walk. It is not safe
//! for concurrent use on its own.
//!
//! [`BTree`] wraps the core in one engine-wide reader-writer lock: `upsert`
//! and `delete` hold exclusive access for their full descent-mutate-rebalance
//! cycle, while `search`, `len`, and the structure dump share the read side.
//! There is no per-node locking; the rebalancing algorithm mutates several
//! nodes per call and is only correct under a single writer.

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use parking_lot::RwLock;

use crate::arena::{NodeArena, NodeId};
use crate::key;
use crate::node::{M, MAX_KEYS, Node, Slot};
use crate::tracing_helpers::{debug_log, trace_log};

// ============================================================================
//  TreeCore - the unsynchronized engine
// ============================================================================

/// The B-tree proper: an arena of nodes plus the current root.
#[derive(Debug)]
pub(crate) struct TreeCore {
    arena: NodeArena,
    root: NodeId,
    /// Live key/value pairs. Overwrites leave it unchanged.
    len: usize,
}

impl TreeCore {
    pub fn new() -> Self {
        let mut arena = NodeArena::new();
        let root = arena.alloc(Node::leaf());
        Self {
            arena,
            root,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    // ------------------------------------------------------------------
    //  Search
    // ------------------------------------------------------------------

    /// Root-to-leaf descent with early exit: keys live at every level, so an
    /// equal key anywhere on the path terminates the search.
    pub fn search(&self, probe: &[u8]) -> Option<&[u8]> {
        let mut node = self.root;
        loop {
            let n = &self.arena[node];
            match n.locate(probe) {
                Slot::Found(i) => return Some(&n.values[i]),
                Slot::Child(i) => {
                    if n.is_leaf {
                        return None;
                    }
                    node = n.child(i);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    //  Upsert
    // ------------------------------------------------------------------

    /// Insert `key` or overwrite its value in place.
    ///
    /// The descent early-exits on equality at any level: a key stored in an
    /// internal node is overwritten right there. Descending past it would
    /// plant a duplicate in a leaf. New keys go into the located leaf in
    /// sorted position; a leaf pushed past `2M` entries splits, and the
    /// split propagates upward as far as it must.
    pub fn upsert(&mut self, probe: &[u8], value: &[u8]) {
        let mut node = self.root;
        loop {
            match self.arena[node].locate(probe) {
                Slot::Found(i) => {
                    trace_log!("upsert overwrite: node={:?} slot={}", node, i);
                    self.arena[node].values[i] = value.into();
                    return;
                }
                Slot::Child(i) => {
                    if self.arena[node].is_leaf {
                        let n = &mut self.arena[node];
                        n.keys.insert(i, probe.into());
                        n.values.insert(i, value.into());
                        self.len += 1;
                        if self.arena[node].key_count() > MAX_KEYS {
                            self.split(node);
                        }
                        return;
                    }
                    node = self.arena[node].child(i);
                }
            }
        }
    }

    /// Split an overflowing node (`2M + 1` entries) around its midpoint.
    ///
    /// The left half stays in place, the right half moves to a fresh
    /// sibling, and the middle entry is promoted to the parent as the
    /// separator. For internal nodes the children are partitioned at the
    /// same midpoint and the reassigned ones re-parented. A parentless
    /// splitter grows a new root instead.
    fn split(&mut self, node_id: NodeId) {
        debug_assert_eq!(self.arena[node_id].key_count(), MAX_KEYS + 1);
        let mid = M; // ⌊(2M + 1) / 2⌋

        let (sep_key, sep_val, right) = {
            let n = &mut self.arena[node_id];
            let right_keys = n.keys.split_off(mid + 1);
            let right_values = n.values.split_off(mid + 1);
            let right_children = if n.is_leaf {
                Vec::new()
            } else {
                n.children.split_off(mid + 1)
            };
            let (sep_key, sep_val) = n.pop_last_entry();
            let right = Node {
                keys: right_keys,
                values: right_values,
                children: right_children,
                parent: n.parent,
                is_leaf: n.is_leaf,
            };
            (sep_key, sep_val, right)
        };

        let right_id = self.arena.alloc(right);
        let adopted: Vec<NodeId> = self.arena[right_id].children.clone();
        for c in adopted {
            self.arena[c].parent = Some(right_id);
        }

        debug_log!(
            "split: node={:?} right={:?} separator={}",
            node_id,
            right_id,
            key::render(&sep_key)
        );

        match self.arena[node_id].parent {
            None => self.grow_root(sep_key, sep_val, node_id, right_id),
            Some(parent) => self.insert_into_parent(parent, sep_key, sep_val, node_id, right_id),
        }
    }

    /// Put a promoted separator into `parent`, between the two split halves.
    /// May overflow the parent and split again, recursively; this is the
    /// propagation that keeps every leaf at the same depth.
    fn insert_into_parent(
        &mut self,
        parent: NodeId,
        sep_key: Box<[u8]>,
        sep_val: Box<[u8]>,
        left: NodeId,
        right: NodeId,
    ) {
        let idx = self.arena[parent].child_index(left);
        let p = &mut self.arena[parent];
        p.keys.insert(idx, sep_key);
        p.values.insert(idx, sep_val);
        p.children.insert(idx + 1, right);
        self.arena[right].parent = Some(parent);

        if self.arena[parent].key_count() > MAX_KEYS {
            self.split(parent);
        }
    }

    /// Create a new root over the two halves of a split root. Height +1.
    fn grow_root(&mut self, sep_key: Box<[u8]>, sep_val: Box<[u8]>, left: NodeId, right: NodeId) {
        let mut root = Node::internal();
        root.keys.push(sep_key);
        root.values.push(sep_val);
        root.children.push(left);
        root.children.push(right);
        let root_id = self.arena.alloc(root);
        self.arena[left].parent = Some(root_id);
        self.arena[right].parent = Some(root_id);
        self.root = root_id;
        debug_log!("root grew: new root {:?}", root_id);
    }

    // ------------------------------------------------------------------
    //  Delete
    // ------------------------------------------------------------------

    /// Remove `key` if present; absent keys are a silent no-op.
    ///
    /// A key found in an internal node is first swapped with its in-order
    /// predecessor so that removal always happens at a leaf. If the leaf
    /// then falls below `M` entries (and is not the root), rebalancing
    /// starts there and may propagate to the root.
    pub fn delete(&mut self, probe: &[u8]) {
        let mut node = self.root;
        let (holder, slot) = loop {
            match self.arena[node].locate(probe) {
                Slot::Found(i) => break (node, i),
                Slot::Child(i) => {
                    if self.arena[node].is_leaf {
                        return;
                    }
                    node = self.arena[node].child(i);
                }
            }
        };

        let (leaf, at) = if self.arena[holder].is_leaf {
            (holder, slot)
        } else {
            self.swap_with_predecessor(holder, slot)
        };

        {
            let l = &mut self.arena[leaf];
            l.keys.remove(at);
            l.values.remove(at);
        }
        self.len -= 1;
        debug_log!("delete: key={} leaf={:?}", key::render(probe), leaf);

        // The root has no minimum occupancy.
        if leaf != self.root && self.arena[leaf].key_count() < M {
            self.rebalance(leaf);
        }
    }

    /// Swap an internal entry with the largest entry of its left subtree.
    ///
    /// Descends from the child at the entry's slot, always taking the
    /// rightmost child, to the predecessor leaf. After the swap the doomed
    /// key sits in that leaf's last slot, still in proper relative position
    /// (the predecessor is larger than everything else in the subtree).
    /// Returns the leaf and the slot to remove.
    fn swap_with_predecessor(&mut self, node: NodeId, slot: usize) -> (NodeId, usize) {
        let mut cur = self.arena[node].child(slot);
        while !self.arena[cur].is_leaf {
            let last = self.arena[cur].children.len() - 1;
            cur = self.arena[cur].child(last);
        }

        assert!(
            self.arena[cur].key_count() > 0,
            "invariant violation: empty leaf on predecessor path"
        );
        let pred = self.arena[cur].key_count() - 1;
        trace_log!(
            "predecessor swap: internal={:?} slot={} leaf={:?} slot={}",
            node,
            slot,
            cur,
            pred
        );

        let k = mem::take(&mut self.arena[node].keys[slot]);
        let v = mem::take(&mut self.arena[node].values[slot]);
        let pk = mem::replace(&mut self.arena[cur].keys[pred], k);
        let pv = mem::replace(&mut self.arena[cur].values[pred], v);
        self.arena[node].keys[slot] = pk;
        self.arena[node].values[slot] = pv;

        (cur, pred)
    }

    /// Fix an underflowing node (`key_count < M`).
    ///
    /// Consult the left sibling first, then the right: a sibling with more
    /// than `M` entries donates one through the parent separator (a
    /// rotation). With no surplus anywhere the node merges with a sibling,
    /// preferring the left one, and the underflow may move up to the
    /// parent. A root emptied by a merge hands the tree to its sole child.
    fn rebalance(&mut self, node_id: NodeId) {
        let Some(parent) = self.arena[node_id].parent else {
            return;
        };
        let idx = self.arena[parent].child_index(node_id);

        if idx > 0 {
            let left = self.arena[parent].children[idx - 1];
            if self.arena[left].key_count() > M {
                self.borrow_from_left(parent, idx, left, node_id);
                return;
            }
        }
        if idx < self.arena[parent].key_count() {
            let right = self.arena[parent].children[idx + 1];
            if self.arena[right].key_count() > M {
                self.borrow_from_right(parent, idx, right, node_id);
                return;
            }
        }

        if idx > 0 {
            let left = self.arena[parent].children[idx - 1];
            self.merge(parent, idx - 1, left, node_id);
        } else {
            let right = self.arena[parent].child(idx + 1);
            self.merge(parent, idx, node_id, right);
        }

        if parent == self.root {
            if self.arena[parent].keys.is_empty() && !self.arena[parent].is_leaf {
                self.collapse_root();
            }
        } else if self.arena[parent].key_count() < M {
            self.rebalance(parent);
        }
    }

    /// Rotate the left sibling's last entry up through the parent separator
    /// and the old separator down into the node's first slot. For internal
    /// nodes the sibling's last child moves across and is re-parented.
    fn borrow_from_left(&mut self, parent: NodeId, idx: usize, left: NodeId, node: NodeId) {
        debug_log!("borrow from left: node={:?} sibling={:?}", node, left);

        let (lk, lv) = self.arena[left].pop_last_entry();
        let moved_child = if self.arena[left].is_leaf {
            None
        } else {
            Some(self.arena[left].pop_last_child())
        };

        let sep_key = mem::replace(&mut self.arena[parent].keys[idx - 1], lk);
        let sep_val = mem::replace(&mut self.arena[parent].values[idx - 1], lv);
        self.arena[node].keys.insert(0, sep_key);
        self.arena[node].values.insert(0, sep_val);

        if let Some(c) = moved_child {
            self.arena[node].children.insert(0, c);
            self.arena[c].parent = Some(node);
        }
    }

    /// Mirror image of [`Self::borrow_from_left`]: the right sibling's first
    /// entry rotates up, the old separator drops into the node's last slot.
    fn borrow_from_right(&mut self, parent: NodeId, idx: usize, right: NodeId, node: NodeId) {
        debug_log!("borrow from right: node={:?} sibling={:?}", node, right);

        let (rk, rv) = {
            let r = &mut self.arena[right];
            (r.keys.remove(0), r.values.remove(0))
        };
        let moved_child = if self.arena[right].is_leaf {
            None
        } else {
            Some(self.arena[right].children.remove(0))
        };

        let sep_key = mem::replace(&mut self.arena[parent].keys[idx], rk);
        let sep_val = mem::replace(&mut self.arena[parent].values[idx], rv);
        self.arena[node].keys.push(sep_key);
        self.arena[node].values.push(sep_val);

        if let Some(c) = moved_child {
            self.arena[node].children.push(c);
            self.arena[c].parent = Some(node);
        }
    }

    /// Merge `right` into `left` with the parent separator at `sep_idx` as
    /// the joining entry, then detach `right` and drop its slot from the
    /// parent. The merged node ends at exactly `2M` entries.
    fn merge(&mut self, parent: NodeId, sep_idx: usize, left: NodeId, right: NodeId) {
        debug_log!(
            "merge: left={:?} right={:?} parent={:?} sep={}",
            left,
            right,
            parent,
            sep_idx
        );

        let (sep_key, sep_val) = {
            let p = &mut self.arena[parent];
            let k = p.keys.remove(sep_idx);
            let v = p.values.remove(sep_idx);
            p.children.remove(sep_idx + 1);
            (k, v)
        };

        let mut right_node = self.arena.recycle(right);
        let adopted: Vec<NodeId> = right_node.children.drain(..).collect();
        {
            let l = &mut self.arena[left];
            l.keys.push(sep_key);
            l.values.push(sep_val);
            l.keys.append(&mut right_node.keys);
            l.values.append(&mut right_node.values);
            l.children.extend_from_slice(&adopted);
        }
        for c in adopted {
            self.arena[c].parent = Some(left);
        }
    }

    /// Replace an emptied internal root with its sole child. Height -1.
    fn collapse_root(&mut self) {
        let old = self.root;
        let new_root = self.arena[old].child(0);
        self.arena[new_root].parent = None;
        self.arena.recycle(old);
        self.root = new_root;
        debug_log!("root collapsed: new root {:?}", new_root);
    }

    // ------------------------------------------------------------------
    //  Diagnostics
    // ------------------------------------------------------------------

    /// Indentation-nested rendering of keys per node, one line per node.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let n = &self.arena[id];
        out.push_str(&"    ".repeat(depth));
        out.push('[');
        for (i, k) in n.keys.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&key::render(k));
        }
        out.push_str("]\n");
        for &c in &n.children {
            self.dump_node(c, depth + 1, out);
        }
    }

    /// Walk every reachable node and panic on the first violated invariant:
    /// strict key order, subtree separation, equal leaf depth, occupancy
    /// bounds, child counts, and parent back-references.
    pub fn validate(&self) {
        assert!(
            self.arena[self.root].parent.is_none(),
            "invariant violation: root has a parent"
        );
        let mut leaf_depth: Option<usize> = None;
        let total = self.validate_node(self.root, 0, None, None, &mut leaf_depth);
        assert_eq!(
            total, self.len,
            "invariant violation: counted {total} entries, len says {}",
            self.len
        );
    }

    fn validate_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        leaf_depth: &mut Option<usize>,
    ) -> usize {
        let n = &self.arena[id];
        assert!(
            n.key_count() <= MAX_KEYS,
            "invariant violation: node {id:?} holds {} keys",
            n.key_count()
        );
        if id != self.root {
            assert!(
                n.key_count() >= M,
                "invariant violation: non-root node {id:?} holds {} keys",
                n.key_count()
            );
        }
        assert_eq!(
            n.keys.len(),
            n.values.len(),
            "invariant violation: keys/values misaligned in {id:?}"
        );

        for pair in n.keys.windows(2) {
            assert_eq!(
                key::compare(&pair[0], &pair[1]),
                Ordering::Less,
                "invariant violation: keys not strictly increasing in {id:?}"
            );
        }
        if let (Some(lo), Some(first)) = (lower, n.keys.first()) {
            assert_eq!(
                key::compare(lo, first),
                Ordering::Less,
                "invariant violation: key at or below subtree bound in {id:?}"
            );
        }
        if let (Some(hi), Some(last)) = (upper, n.keys.last()) {
            assert_eq!(
                key::compare(last, hi),
                Ordering::Less,
                "invariant violation: key at or above subtree bound in {id:?}"
            );
        }

        let mut total = n.key_count();
        if n.is_leaf {
            assert!(
                n.children.is_empty(),
                "invariant violation: leaf {id:?} has children"
            );
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) => assert_eq!(d, depth, "invariant violation: leaves at unequal depth"),
            }
        } else {
            assert_eq!(
                n.children.len(),
                n.key_count() + 1,
                "invariant violation: internal node {id:?} child count"
            );
            for (i, &c) in n.children.iter().enumerate() {
                assert_eq!(
                    self.arena[c].parent,
                    Some(id),
                    "invariant violation: broken parent link {c:?} -> {id:?}"
                );
                let lo = if i == 0 {
                    lower
                } else {
                    Some(n.keys[i - 1].as_ref())
                };
                let hi = if i == n.key_count() {
                    upper
                } else {
                    Some(n.keys[i].as_ref())
                };
                total += self.validate_node(c, depth + 1, lo, hi, leaf_depth);
            }
        }
        total
    }

    #[cfg(test)]
    fn root(&self) -> &Node {
        &self.arena[self.root]
    }

    #[cfg(test)]
    fn node(&self, id: NodeId) -> &Node {
        &self.arena[id]
    }
}

// ============================================================================
//  BTree - the public, locked surface
// ============================================================================

/// A concurrent in-memory ordered index over byte-string keys.
///
/// One engine-wide [`parking_lot::RwLock`] guards the whole tree. Mutating
/// calls ([`upsert`](Self::upsert), [`delete`](Self::delete)) hold the write
/// lock for their entire descent-mutate-rebalance cycle, so no two
/// structural mutations ever interleave; lookups and diagnostics share the
/// read side and may run concurrently with each other.
///
/// # Example
///
/// ```rust
/// use bytetree::BTree;
///
/// let tree = BTree::new();
/// tree.upsert(b"key", b"value");
/// assert_eq!(tree.search(b"key"), Some(b"value".to_vec()));
///
/// tree.delete(b"key");
/// assert_eq!(tree.search(b"key"), None);
/// ```
///
/// # Thread safety
///
/// `BTree` is `Send + Sync`; share it across threads via `Arc<BTree>`.
/// Lock acquisition is the only blocking point; the engine itself never
/// spawns threads, suspends, or retries.
pub struct BTree {
    inner: RwLock<TreeCore>,
}

impl BTree {
    /// Create an empty tree: a single key-less root leaf.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TreeCore::new()),
        }
    }

    /// Insert `key` with `value`, or overwrite the existing value in place.
    ///
    /// Never fails; empty byte strings are valid keys and values.
    pub fn upsert(&self, key: &[u8], value: &[u8]) {
        self.inner.write().upsert(key, value);
    }

    /// Remove `key` if present. Deleting an absent key is a no-op, not an
    /// error, and leaves the tree contents untouched.
    pub fn delete(&self, key: &[u8]) {
        self.inner.write().delete(key);
    }

    /// Look up the value stored under `key`. Never mutates.
    #[must_use]
    pub fn search(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().search(key).map(<[u8]>::to_vec)
    }

    /// Number of live key/value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True iff the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the tree structure for diagnostics: one line per node,
    /// children indented one level under their parent, keys via
    /// [`key::render`]. Takes the read lock, so the snapshot is consistent
    /// even with concurrent writers. Not a stable or parseable format.
    #[must_use]
    pub fn dump_structure(&self) -> String {
        self.inner.read().dump()
    }

    /// Walk the whole tree and panic on the first violated structural
    /// invariant. Intended for tests and embedders that want a hard check
    /// after a workload; holds the read lock for the duration.
    pub fn assert_invariants(&self) {
        self.inner.read().validate();
    }
}

impl Default for BTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTree")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  Engine-level tests (structure shapes the public API can't observe)
// ============================================================================
