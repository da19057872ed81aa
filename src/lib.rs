//! # `bytetree`
//!
//! An in-memory ordered key-value index built on a balanced B-tree over
//! opaque byte-string keys and values, safe for concurrent callers through
//! one engine-wide reader-writer lock.
//!
//! - Fixed branching parameter `M = 2`: every non-root node holds 2–4 keys,
//!   internal nodes carry one child per key gap, and every leaf sits at the
//!   same depth.
//! - Keys order lexicographically as unsigned bytes, shorter-is-less on a
//!   shared prefix; see [`key::compare`].
//! - [`BTree::upsert`] and [`BTree::delete`] take exclusive access for their
//!   whole descent-mutate-rebalance cycle; [`BTree::search`] and the
//!   diagnostic [`BTree::dump_structure`] share the read side.
//!
//! ## Example
//!
//! ```rust
//! use bytetree::BTree;
//!
//! let tree = BTree::new();
//! tree.upsert(b"apple", b"red");
//! tree.upsert(b"banana", b"yellow");
//! tree.upsert(b"apple", b"green"); // overwrite in place
//!
//! assert_eq!(tree.search(b"apple"), Some(b"green".to_vec()));
//! assert_eq!(tree.len(), 2);
//!
//! tree.delete(b"banana");
//! tree.delete(b"banana"); // absent key: silent no-op
//! assert_eq!(tree.search(b"banana"), None);
//! ```
//!
//! ## Scope
//!
//! Purely in-memory: no persistence, logging of data, or on-disk format.
//! No range scans, no multi-key transactions, no per-node locking. The
//! structure dump exists for diagnostics only and is not a stable format.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod key;

mod arena;
mod node;
mod tracing_helpers;
mod tree;

pub use node::{M, MAX_CHILDREN, MAX_KEYS};
pub use tree::BTree;
