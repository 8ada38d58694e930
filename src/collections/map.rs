//! Persistent sorted map over byte keys

use crate::cell::{Cell, Hashable};
use crate::codec::MAX_BLOB_LENGTH;
use crate::error::{Error, Result};
use crate::model::Hash;
use crate::refs::Ref;
use crate::trie::{self, node_of, Entry, TrieIter, TrieKind};
use bytes::Bytes;
use std::sync::Arc;

const KIND: TrieKind = TrieKind::Map;

/// Immutable map from non-empty byte keys to refs, iterated in key order
///
/// Every update returns a new map sharing unchanged subtrees with the old
/// one. Two maps with the same entries have the same hash no matter how
/// they were built.
#[derive(Clone, Debug)]
pub struct RadixMap {
    root: Arc<Cell>,
}

impl RadixMap {
    pub fn new() -> Self {
        RadixMap {
            root: trie::empty(KIND),
        }
    }

    /// Wrap an existing map cell
    pub fn from_cell(cell: Arc<Cell>) -> Result<Self> {
        node_of(&cell, KIND)?;
        Ok(RadixMap { root: cell })
    }

    pub fn from_ref(r: &Ref) -> Result<Self> {
        Self::from_cell(r.value()?)
    }

    pub fn from_entries<K, I>(entries: I) -> Result<Self>
    where
        K: Into<Bytes>,
        I: IntoIterator<Item = (K, Ref)>,
    {
        entries
            .into_iter()
            .try_fold(RadixMap::new(), |map, (k, v)| map.assoc(k, v))
    }

    pub fn cell(&self) -> &Arc<Cell> {
        &self.root
    }

    pub fn to_ref(&self) -> Ref {
        Ref::direct(self.root.clone())
    }

    pub fn hash(&self) -> Hash {
        self.root.hash()
    }

    pub fn count(&self) -> u64 {
        node_of(&self.root, KIND).map(|n| n.count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Value stored under `key`. Empty keys are never present.
    pub fn get(&self, key: &[u8]) -> Result<Option<Ref>> {
        Ok(trie::get(&self.root, KIND, key)?.map(|e| e.value().clone()))
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Map with `key` bound to `value`
    pub fn assoc(&self, key: impl Into<Bytes>, value: Ref) -> Result<RadixMap> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::invalid("map keys must be non-empty"));
        }
        if key.len() > MAX_BLOB_LENGTH {
            return Err(Error::invalid(format!(
                "map key of {} bytes exceeds limit {}",
                key.len(),
                MAX_BLOB_LENGTH
            )));
        }
        Ok(self.replace(trie::insert(&self.root, KIND, Entry::new(key, value))?))
    }

    pub fn assoc_cell(&self, key: impl Into<Bytes>, value: Arc<Cell>) -> Result<RadixMap> {
        self.assoc(key, Ref::direct(value))
    }

    /// Map without `key`. Absent keys return an identical map.
    pub fn dissoc(&self, key: &[u8]) -> Result<RadixMap> {
        Ok(self.replace(trie::remove(&self.root, KIND, key)?))
    }

    /// Entry at position `index` in key order
    pub fn entry_at(&self, index: u64) -> Result<Option<Entry>> {
        trie::entry_at(&self.root, KIND, index)
    }

    pub fn first(&self) -> Result<Option<Entry>> {
        self.entry_at(0)
    }

    pub fn last(&self) -> Result<Option<Entry>> {
        match self.count() {
            0 => Ok(None),
            n => self.entry_at(n - 1),
        }
    }

    pub fn iter(&self) -> TrieIter {
        TrieIter::new(self.root.clone(), KIND)
    }

    pub fn keys(&self) -> Result<Vec<Bytes>> {
        self.iter().map(|e| e.map(|e| e.key().clone())).collect()
    }

    pub fn entries_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        trie::entries_with_prefix(&self.root, KIND, prefix)
    }

    /// True if both maps share the same root instance
    pub fn ptr_eq(&self, other: &RadixMap) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    fn replace(&self, updated: Option<Arc<Cell>>) -> RadixMap {
        match updated {
            Some(root) => RadixMap { root },
            None => self.clone(),
        }
    }
}

impl Default for RadixMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Hashable for RadixMap {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

impl PartialEq for RadixMap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.hash() == other.hash()
    }
}

impl Eq for RadixMap {}
