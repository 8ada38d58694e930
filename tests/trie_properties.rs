//! Map and set behaviour checked against std collections
//!
//! Run with:
//! ```bash
//! cargo test --test trie_properties
//! ```

use ledger_cells::codec::decode;
use ledger_cells::{persist, Cell, Loader, MemoryStore, RadixMap, RadixSet, Ref, Store};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn int(i: i64) -> Ref {
    Cell::integer(i).to_ref()
}

fn map_of<'a>(entries: impl IntoIterator<Item = (&'a Vec<u8>, &'a i64)>) -> RadixMap {
    let mut map = RadixMap::new();
    for (k, v) in entries {
        map = map.assoc(k.clone(), int(*v)).unwrap();
    }
    map
}

fn set_of(elements: &BTreeSet<i64>) -> RadixSet {
    RadixSet::from_cells(elements.iter().map(|i| Cell::integer(*i))).unwrap()
}

fn keys_of(map: &RadixMap) -> Vec<Vec<u8>> {
    map.keys().unwrap().into_iter().map(|k| k.to_vec()).collect()
}

fn entries() -> impl Strategy<Value = BTreeMap<Vec<u8>, i64>> {
    prop::collection::btree_map(prop::collection::vec(any::<u8>(), 1..5), any::<i64>(), 0..64)
}

proptest! {
    #[test]
    fn shape_independent_of_insertion_order(model in entries()) {
        let forward = map_of(model.iter());
        let backward = map_of(model.iter().rev());
        prop_assert_eq!(forward.hash(), backward.hash());
        prop_assert_eq!(forward.cell().encoding(), backward.cell().encoding());
    }

    #[test]
    fn iteration_is_sorted(model in entries()) {
        let map = map_of(model.iter().rev());
        let expected: Vec<Vec<u8>> = model.keys().cloned().collect();
        prop_assert_eq!(keys_of(&map), expected);
        prop_assert_eq!(map.count(), model.len() as u64);
        for (i, (k, v)) in model.iter().enumerate() {
            let e = map.entry_at(i as u64).unwrap().unwrap();
            prop_assert_eq!(e.key().as_ref(), k.as_slice());
            prop_assert_eq!(e.value().value().unwrap().as_integer(), Some(*v));
        }
    }

    #[test]
    fn dissoc_matches_model(model in entries(), drop_mask in any::<u64>()) {
        let mut map = map_of(model.iter());
        let mut remaining = model.clone();
        for (i, k) in model.keys().enumerate() {
            if drop_mask & (1 << (i % 64)) != 0 {
                map = map.dissoc(k).unwrap();
                remaining.remove(k);
            }
        }
        let rebuilt = map_of(remaining.iter());
        prop_assert_eq!(map.hash(), rebuilt.hash());
        prop_assert_eq!(map.count(), remaining.len() as u64);
        for k in model.keys() {
            prop_assert_eq!(map.get(k).unwrap().is_some(), remaining.contains_key(k));
        }
    }

    #[test]
    fn prefix_scan_matches_model(model in entries(), prefix in prop::collection::vec(any::<u8>(), 0..2)) {
        let map = map_of(model.iter());
        let found: Vec<Vec<u8>> = map
            .entries_with_prefix(&prefix)
            .unwrap()
            .into_iter()
            .map(|e| e.key().to_vec())
            .collect();
        let expected: Vec<Vec<u8>> = model.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn set_algebra_matches_model(
        a in prop::collection::btree_set(-100i64..100, 0..60),
        b in prop::collection::btree_set(-100i64..100, 0..60),
    ) {
        let (sa, sb) = (set_of(&a), set_of(&b));

        let union: BTreeSet<i64> = a.union(&b).copied().collect();
        let inter: BTreeSet<i64> = a.intersection(&b).copied().collect();
        let left: BTreeSet<i64> = a.difference(&b).copied().collect();
        let right: BTreeSet<i64> = b.difference(&a).copied().collect();

        prop_assert_eq!(sa.union(&sb).unwrap().hash(), set_of(&union).hash());
        prop_assert_eq!(sa.intersect(&sb).unwrap().hash(), set_of(&inter).hash());
        prop_assert_eq!(sa.difference(&sb).unwrap().hash(), set_of(&left).hash());
        prop_assert_eq!(sa.right_difference(&sb).unwrap().hash(), set_of(&right).hash());

        // union and intersection commute
        prop_assert_eq!(sa.union(&sb).unwrap(), sb.union(&sa).unwrap());
        prop_assert_eq!(sa.intersect(&sb).unwrap(), sb.intersect(&sa).unwrap());
        prop_assert_eq!(sa.is_subset(&sb).unwrap(), a.is_subset(&b));
    }
}

#[test]
fn test_delete_collapses_to_canonical_shape() {
    let keys: Vec<Vec<u8>> = vec![vec![0x10], vec![0x1F], vec![0x20]];
    let full = map_of(keys.iter().zip([1i64, 2, 3].iter()));
    let trimmed = full.dissoc(&[0x1F]).unwrap();

    let expected_keys = [vec![0x10u8], vec![0x20]];
    let expected = map_of(expected_keys.iter().zip([1i64, 3].iter()));

    assert_eq!(trimmed.cell().encoding(), expected.cell().encoding());
    assert_eq!(trimmed.hash(), expected.hash());
}

#[test]
fn test_dissoc_everything_gives_empty_map() {
    let model: BTreeMap<Vec<u8>, i64> = (0..50u8).map(|i| (vec![i, i], i as i64)).collect();
    let mut map = map_of(model.iter());
    for k in model.keys() {
        map = map.dissoc(k).unwrap();
    }
    assert!(map.is_empty());
    assert!(map.ptr_eq(&RadixMap::new()));
}

#[test]
fn test_large_map_roundtrips_through_encoding() {
    let model: BTreeMap<Vec<u8>, i64> = (0..400i64)
        .map(|i| (format!("account-{:04}", i).into_bytes(), i * 7))
        .collect();
    let map = map_of(model.iter());

    let decoded = decode(map.cell().encoding()).unwrap();
    assert_eq!(decoded.hash(), map.hash());
    let reloaded = RadixMap::from_cell(decoded).unwrap();
    assert_eq!(reloaded.count(), 400);
    // children beyond the embedding limit are not available offline
    assert!(reloaded.get(b"account-0123").unwrap_err().is_missing_data());
}

#[test]
fn test_large_map_resolves_through_store() {
    let model: BTreeMap<Vec<u8>, i64> = (0..400i64)
        .map(|i| (format!("account-{:04}", i).into_bytes(), i))
        .collect();
    let map = map_of(model.iter());

    let store = Arc::new(MemoryStore::new());
    persist(store.as_ref(), &map.to_ref()).unwrap();

    let loader = Loader::new(store.clone(), 1024).unwrap();
    let remote = RadixMap::from_ref(&loader.soft_ref(map.hash())).unwrap();
    assert_eq!(remote.count(), 400);
    for (k, v) in &model {
        let value = remote.get(k).unwrap().unwrap().value().unwrap();
        assert_eq!(value.as_integer(), Some(*v));
    }
    assert!(store.contains(&map.hash()).unwrap());
}

#[test]
fn test_set_update_through_soft_children() {
    let base: BTreeSet<i64> = (0..300).collect();
    let set = set_of(&base);

    let store = Arc::new(MemoryStore::new());
    persist(store.as_ref(), &set.to_ref()).unwrap();
    let loader = Loader::new(store, 1024).unwrap();

    let decoded = loader.decode(set.cell().encoding()).unwrap();
    let remote = RadixSet::from_cell(decoded).unwrap();
    let extended = remote.conj_cell(Cell::integer(1000)).unwrap();
    let shrunk = extended.disj(&Cell::integer(5).to_ref()).unwrap();

    let mut expected = base.clone();
    expected.insert(1000);
    expected.remove(&5);
    assert_eq!(shrunk.hash(), set_of(&expected).hash());
}
