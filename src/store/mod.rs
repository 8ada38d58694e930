//! Content-addressed storage
//!
//! A [`Store`] maps hashes to cells together with the highest
//! [`RefStatus`] each has reached. Soft refs reach a store through a
//! [`Loader`], which fronts it with a bounded cache.

mod file_store;
mod loader;
mod memory;

pub use file_store::FileStore;
pub use loader::{CacheStats, Loader};
pub use memory::MemoryStore;

use crate::cell::{Cell, RefContainer};
use crate::error::Result;
use crate::model::Hash;
use crate::refs::{Ref, RefStatus};
use std::sync::Arc;
use tracing::debug;

/// Backing storage for cells
///
/// Implementations must be safe to call from several threads at once.
pub trait Store: Send + Sync {
    /// Look up `hash`. Non-embedded children of the returned cell should be
    /// soft refs bound to `loader`.
    ///
    /// Absence is always `Ok(None)`. `Err` is reserved for I/O failures and
    /// stored bytes that do not decode.
    fn ref_for_hash(&self, hash: &Hash, loader: &Arc<Loader>) -> Result<Option<Ref>>;

    /// Record the target of `r` with at least `status`, returning a ref
    /// carrying the status actually held by the store
    fn store_ref(&self, r: &Ref, status: RefStatus) -> Result<Ref>;

    /// Status held for `hash`, or `None` if absent
    fn status_of(&self, hash: &Hash) -> Result<Option<RefStatus>>;

    fn contains(&self, hash: &Hash) -> Result<bool> {
        Ok(self.status_of(hash)?.is_some())
    }
}

/// Write a single cell at [`RefStatus::Stored`]. Children are not touched.
pub fn store_cell(store: &dyn Store, cell: &Arc<Cell>) -> Result<Ref> {
    store.store_ref(&Ref::direct(cell.clone()), RefStatus::Stored)
}

/// Write the target of `r` and every non-embedded descendant at
/// [`RefStatus::Persisted`]
///
/// Subtrees the store already holds as persisted are skipped without
/// being loaded.
pub fn persist(store: &dyn Store, r: &Ref) -> Result<Ref> {
    if r.status().reaches(RefStatus::Persisted) {
        return Ok(r.clone());
    }
    let hash = r.hash();
    if let Some(held) = store.status_of(&hash)? {
        if held.reaches(RefStatus::Persisted) {
            return Ok(r.with_status(held));
        }
    }

    let cell = r.value()?;
    for child in cell.child_refs() {
        if !child.is_embedded() {
            persist(store, child)?;
        }
    }
    debug!(hash = %hash.short(), "persisting cell");
    store.store_ref(&Ref::direct(cell), RefStatus::Persisted)
}
