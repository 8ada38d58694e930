//! Hash-consed radix trie shared by maps and sets
//!
//! Keys are walked one hex digit (nibble) at a time. A branch records the
//! digits all keys below it share, so chains of single-child nodes never
//! exist and every key set has exactly one trie shape. That makes the root
//! hash a function of the contents alone.
//!
//! Nodes are ordinary cells: they are embedded, stored and loaded like any
//! other value, and children beyond the embedding limit are soft refs.

mod digits;
mod iter;
mod merge;
mod node;
mod tree;

pub use digits::{common_digits, digit, digit_count};
pub use iter::TrieIter;
pub use merge::{merge, Outcome, Presence, SetOp};
pub use node::{Body, Branch, Entry, TrieKind, TrieNode};
pub use tree::{empty, entries_with_prefix, entry_at, get, insert, remove};

pub(crate) use tree::node_of;
