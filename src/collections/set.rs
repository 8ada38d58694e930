//! Persistent set of cells keyed by content hash

use crate::cell::{Cell, Hashable};
use crate::error::Result;
use crate::model::Hash;
use crate::refs::Ref;
use crate::trie::{self, node_of, Entry, SetOp, TrieIter, TrieKind};
use bytes::Bytes;
use std::sync::Arc;

const KIND: TrieKind = TrieKind::Set;

/// Immutable set of values, ordered by element hash
#[derive(Clone, Debug)]
pub struct RadixSet {
    root: Arc<Cell>,
}

impl RadixSet {
    pub fn new() -> Self {
        RadixSet {
            root: trie::empty(KIND),
        }
    }

    pub fn from_cell(cell: Arc<Cell>) -> Result<Self> {
        node_of(&cell, KIND)?;
        Ok(RadixSet { root: cell })
    }

    pub fn from_ref(r: &Ref) -> Result<Self> {
        Self::from_cell(r.value()?)
    }

    pub fn from_cells<I>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<Cell>>,
    {
        cells
            .into_iter()
            .try_fold(RadixSet::new(), |set, c| set.conj(Ref::direct(c)))
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

    /// Set with `element` added. Already-present elements return an
    /// identical set.
    pub fn conj(&self, element: Ref) -> Result<RadixSet> {
        Ok(self.replace(trie::insert(&self.root, KIND, Entry::element(element))?))
    }

    pub fn conj_cell(&self, element: Arc<Cell>) -> Result<RadixSet> {
        self.conj(Ref::direct(element))
    }

    pub fn disj(&self, element: &Ref) -> Result<RadixSet> {
        self.disj_hash(&element.hash())
    }

    pub fn disj_hash(&self, hash: &Hash) -> Result<RadixSet> {
        Ok(self.replace(trie::remove(&self.root, KIND, hash.as_bytes())?))
    }

    pub fn contains(&self, element: &Ref) -> Result<bool> {
        self.contains_hash(&element.hash())
    }

    pub fn contains_hash(&self, hash: &Hash) -> Result<bool> {
        Ok(trie::get(&self.root, KIND, hash.as_bytes())?.is_some())
    }

    /// Stored element with this hash
    pub fn get(&self, hash: &Hash) -> Result<Option<Ref>> {
        Ok(trie::get(&self.root, KIND, hash.as_bytes())?.map(|e| e.value().clone()))
    }

    pub fn merge(&self, other: &RadixSet, op: SetOp) -> Result<RadixSet> {
        let root = trie::merge(&self.root, &other.root, op)?;
        Ok(RadixSet { root })
    }

    pub fn union(&self, other: &RadixSet) -> Result<RadixSet> {
        self.merge(other, SetOp::Union)
    }

    pub fn intersect(&self, other: &RadixSet) -> Result<RadixSet> {
        self.merge(other, SetOp::Intersect)
    }

    /// Elements of `self` not in `other`
    pub fn difference(&self, other: &RadixSet) -> Result<RadixSet> {
        self.merge(other, SetOp::Difference)
    }

    /// Elements of `other` not in `self`
    pub fn right_difference(&self, other: &RadixSet) -> Result<RadixSet> {
        self.merge(other, SetOp::RightDifference)
    }

    pub fn is_subset(&self, other: &RadixSet) -> Result<bool> {
        Ok(self.difference(other)?.is_empty())
    }

    /// Elements in hash order
    pub fn iter(&self) -> impl Iterator<Item = Result<Ref>> {
        TrieIter::new(self.root.clone(), KIND).map(|e| e.map(|e| e.into_parts().1))
    }

    pub fn hashes(&self) -> Result<Vec<Hash>> {
        TrieIter::new(self.root.clone(), KIND)
            .map(|e| e.and_then(|e| key_hash(e.key())))
            .collect()
    }

    pub fn ptr_eq(&self, other: &RadixSet) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    fn replace(&self, updated: Option<Arc<Cell>>) -> RadixSet {
        match updated {
            Some(root) => RadixSet { root },
            None => self.clone(),
        }
    }
}

fn key_hash(key: &Bytes) -> Result<Hash> {
    Hash::from_slice(key)
        .ok_or_else(|| crate::error::Error::Corruption("set key is not a hash".into()))
}

impl Default for RadixSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Hashable for RadixSet {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

impl PartialEq for RadixSet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.hash() == other.hash()
    }
}

impl Eq for RadixSet {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(range: std::ops::Range<i64>) -> RadixSet {
        RadixSet::from_cells(range.map(Cell::integer)).unwrap()
    }

    #[test]
    fn test_conj_contains_disj() {
        let one = Cell::integer(1);
        let set = RadixSet::new().conj_cell(one.clone()).unwrap();
        assert!(set.contains(&one.to_ref()).unwrap());
        assert!(!set.contains(&Cell::integer(2).to_ref()).unwrap());
        assert!(set.disj(&one.to_ref()).unwrap().is_empty());
    }

    #[test]
    fn test_conj_present_element_keeps_identity() {
        let set = ints(0..20);
        let again = set.conj_cell(Cell::integer(7)).unwrap();
        assert!(again.ptr_eq(&set));
    }

    #[test]
    fn test_algebra() {
        let a = ints(0..30);
        let b = ints(20..50);
        assert_eq!(a.union(&b).unwrap(), ints(0..50));
        assert_eq!(a.intersect(&b).unwrap(), ints(20..30));
        assert_eq!(a.difference(&b).unwrap(), ints(0..20));
        assert_eq!(a.right_difference(&b).unwrap(), ints(30..50));
        assert!(ints(22..25).is_subset(&a).unwrap());
        assert!(!b.is_subset(&a).unwrap());
    }

    #[test]
    fn test_self_merge_shortcuts() {
        let a = ints(0..10);
        assert!(a.union(&a).unwrap().ptr_eq(&a));
        assert!(a.intersect(&a).unwrap().ptr_eq(&a));
        assert!(a.difference(&a).unwrap().is_empty());
    }

    #[test]
    fn test_iter_in_hash_order() {
        let set = ints(0..40);
        let hashes = set.hashes().unwrap();
        assert_eq!(hashes.len(), 40);
        assert!(hashes.windows(2).all(|w| w[0] < w[1]));
        for (r, h) in set.iter().zip(&hashes) {
            assert_eq!(r.unwrap().hash(), *h);
        }
    }
}
