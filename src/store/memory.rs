//! In-memory store

use crate::cell::Cell;
use crate::error::Result;
use crate::model::Hash;
use crate::refs::{Ref, RefStatus};
use crate::store::{Loader, Store};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A store backed by a hash map. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    cells: RwLock<HashMap<Hash, (Arc<Cell>, RefStatus)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn ref_for_hash(&self, hash: &Hash, _loader: &Arc<Loader>) -> Result<Option<Ref>> {
        let cells = self.cells.read();
        Ok(cells
            .get(hash)
            .map(|(cell, status)| Ref::direct(cell.clone()).with_status(*status)))
    }

    fn store_ref(&self, r: &Ref, status: RefStatus) -> Result<Ref> {
        let cell = r.value()?;
        let hash = cell.hash();
        let mut cells = self.cells.write();
        let held = match cells.get_mut(&hash) {
            Some((_, existing)) => {
                *existing = (*existing).max(status);
                *existing
            }
            None => {
                debug!(hash = %hash.short(), %status, "storing cell");
                cells.insert(hash, (cell.clone(), status));
                status
            }
        };
        Ok(Ref::direct(cell).with_status(held.max(r.status())))
    }

    fn status_of(&self, hash: &Hash) -> Result<Option<RefStatus>> {
        Ok(self.cells.read().get(hash).map(|(_, s)| *s))
    }
}
