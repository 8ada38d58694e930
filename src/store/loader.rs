//! Cache-fronted resolution of soft refs

use crate::cell::Cell;
use crate::codec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Hash;
use crate::refs::Ref;
use crate::store::Store;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Hit and miss counters for a [`Loader`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Resolves hashes to cells: bounded LRU cache first, then the store
///
/// Shared behind an `Arc`; every soft ref created by this loader holds a
/// clone of that `Arc`.
pub struct Loader {
    store: Arc<dyn Store>,
    cache: Mutex<LruCache<Hash, Arc<Cell>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Loader {
    /// Create a loader caching up to `capacity` cells
    pub fn new(store: Arc<dyn Store>, capacity: usize) -> Result<Arc<Self>> {
        let cap = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::Config("cache capacity must be > 0".into()))?;
        Ok(Arc::new(Loader {
            store,
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }))
    }

    pub fn with_config(store: Arc<dyn Store>, config: &Config) -> Result<Arc<Self>> {
        config.validate()?;
        Self::new(store, config.cache_capacity)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Soft ref to `hash` resolved through this loader
    pub fn soft_ref(self: &Arc<Self>, hash: Hash) -> Ref {
        Ref::soft(hash, self.clone())
    }

    /// Resolve `hash`, consulting the store at most once per cache miss
    pub fn load(self: &Arc<Self>, hash: &Hash) -> Result<Arc<Cell>> {
        if let Some(cell) = self.cache.lock().get(hash).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(hash = %hash.short(), "cache hit");
            return Ok(cell);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(hash = %hash.short(), "cache miss; fetching from store");

        let found = self
            .store
            .ref_for_hash(hash, self)?
            .ok_or(Error::MissingData(*hash))?;
        let cell = found
            .direct_value()
            .cloned()
            .ok_or_else(|| Error::Corruption(format!("store returned unresolved ref for {}", hash)))?;

        let actual = cell.hash();
        if actual != *hash {
            warn!(expected = %hash.short(), actual = %actual.short(), "hash mismatch from store");
            return Err(Error::Corruption(format!(
                "requested {}, store returned {}",
                hash, actual
            )));
        }

        self.cache.lock().put(*hash, cell.clone());
        Ok(cell)
    }

    /// Resolve a hash read from a `REF` marker inside a parent
    ///
    /// An embeddable cell is always inlined in canonical form, so a marker
    /// pointing at one means the parent encoding was not canonical.
    pub fn load_child(self: &Arc<Self>, hash: &Hash) -> Result<Arc<Cell>> {
        let cell = self.load(hash)?;
        if cell.is_embedded() {
            warn!(hash = %hash.short(), "embeddable cell referenced by hash");
            return Err(Error::format(format!(
                "child {} is embeddable but was referenced by hash",
                hash
            )));
        }
        Ok(cell)
    }

    /// Cached cell for `hash`, without touching the store
    pub fn cached(&self, hash: &Hash) -> Option<Arc<Cell>> {
        self.cache.lock().peek(hash).cloned()
    }

    /// Put an already-resolved cell in the cache
    pub fn prime(&self, cell: &Arc<Cell>) {
        self.cache.lock().put(cell.hash(), cell.clone());
    }

    /// Decode bytes with non-embedded children bound to this loader
    pub fn decode(self: &Arc<Self>, bytes: &[u8]) -> Result<Arc<Cell>> {
        codec::decode_with(bytes, self)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
