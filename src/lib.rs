//! # ledger_cells
//!
//! Immutable, content-addressed values for replicated ledgers.
//!
//! Every value is a [`Cell`] with one canonical byte encoding and a BLAKE3
//! hash of that encoding. Small cells are embedded inside their parents;
//! larger ones are referenced by hash and can live in a [`Store`], to be
//! pulled back lazily through a cache-fronted [`Loader`].
//!
//! ## Core Concepts
//!
//! - **Cells**: immutable values with memoised encoding and hash
//! - **Refs**: direct (in memory) or soft (hash only, loaded on demand)
//! - **Radix tries**: canonical maps and sets whose hash depends only on
//!   their contents
//! - **Stores**: hash-keyed backing storage with per-entry status
//!
//! ## Example
//!
//! ```ignore
//! use ledger_cells::{Cell, RadixMap};
//!
//! let map = RadixMap::new()
//!     .assoc(&b"alice"[..], Cell::integer(100).to_ref())?
//!     .assoc(&b"bob"[..], Cell::integer(50).to_ref())?;
//! let bytes = map.cell().encoding().clone();
//! let decoded = ledger_cells::codec::decode(&bytes)?;
//! assert_eq!(decoded.hash(), map.hash());
//! ```

pub mod cell;
pub mod codec;
pub mod collections;
pub mod config;
pub mod model;
pub mod refs;
pub mod store;
pub mod trie;

mod error;

pub use cell::{Cell, Encodable, Hashable, RefContainer, Value};
pub use collections::{RadixMap, RadixSet};
pub use config::Config;
pub use error::{Error, Result};
pub use model::Hash;
pub use refs::{Ref, RefStatus};
pub use store::{persist, store_cell, FileStore, Loader, MemoryStore, Store};
pub use trie::{Entry, SetOp, TrieKind};

/// Store file format version
pub const VERSION: u32 = 1;

/// Magic bytes at the start of a store file
pub const MAGIC: &[u8; 8] = b"LCELLS01";
