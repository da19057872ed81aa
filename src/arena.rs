//! Slab arena for B-tree nodes.
//!
//! All nodes of one tree live in a single `Vec`, addressed by copyable
//! [`NodeId`] indices. This keeps the parent back-reference an ordinary
//! index instead of a second ownership edge: the arena owns every node, the
//! tree structure is expressed purely through indices, and discarding a node
//! (after a merge or a root collapse) just returns its slot to a free list.

use std::mem;
use std::ops::{Index, IndexMut};

use crate::node::Node;

/// Index of a node within its arena.
///
/// Only meaningful for the arena that produced it; ids are recycled after
/// [`NodeArena::recycle`], so holding one across structural mutations is
/// only sound inside the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owning storage for every node of one tree.
#[derive(Debug)]
pub(crate) struct NodeArena {
    nodes: Vec<Node>,
    /// Slots returned by `recycle`, reused before the vec grows.
    free: Vec<NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store `node` and return its id, reusing a free slot when possible.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = node;
            id
        } else {
            let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or_else(|_| {
                panic!("arena exceeded {} nodes", u32::MAX)
            }));
            self.nodes.push(node);
            id
        }
    }

    /// Detach a node from the arena, returning its contents by value and
    /// marking the slot for reuse. Used when a merge or root collapse
    /// discards a node: the caller drains its entries, then drops the rest.
    pub fn recycle(&mut self, id: NodeId) -> Node {
        let node = mem::replace(&mut self.nodes[id.index()], Node::leaf());
        self.free.push(id);
        node
    }

    /// Number of live (non-recycled) nodes. Diagnostic only.
    pub fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}
