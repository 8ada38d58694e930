//! Lazy loading of soft refs through a Loader
//!
//! Run with:
//! ```bash
//! cargo test --test soft_refs
//! ```

use bytes::Bytes;
use ledger_cells::codec::tag;
use ledger_cells::{
    persist, Cell, Config, Error, FileStore, Hash, Loader, RadixMap, RadixSet, Ref,
    RefContainer, RefStatus, Result, Store,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Holds encodings only, so every fetch decodes a fresh cell whose
/// children are soft refs
#[derive(Default)]
struct CountingStore {
    encodings: RwLock<HashMap<Hash, (Bytes, RefStatus)>>,
    fetches: AtomicU64,
}

impl CountingStore {
    fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Store for CountingStore {
    fn ref_for_hash(&self, hash: &Hash, loader: &Arc<Loader>) -> Result<Option<Ref>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let Some((bytes, status)) = self.encodings.read().get(hash).cloned() else {
            return Ok(None);
        };
        Ok(Some(Ref::direct(loader.decode(&bytes)?).with_status(status)))
    }

    fn store_ref(&self, r: &Ref, status: RefStatus) -> Result<Ref> {
        let cell = r.value()?;
        let mut encodings = self.encodings.write();
        let slot = encodings
            .entry(cell.hash())
            .or_insert_with(|| (cell.encoding().clone(), status));
        slot.1 = slot.1.max(status);
        Ok(Ref::direct(cell).with_status(slot.1))
    }

    fn status_of(&self, hash: &Hash) -> Result<Option<RefStatus>> {
        Ok(self.encodings.read().get(hash).map(|(_, s)| *s))
    }
}

/// Answers every lookup with the same unrelated cell
struct LyingStore {
    decoy: Arc<Cell>,
}

impl Store for LyingStore {
    fn ref_for_hash(&self, _hash: &Hash, _loader: &Arc<Loader>) -> Result<Option<Ref>> {
        Ok(Some(Ref::direct(self.decoy.clone())))
    }

    fn store_ref(&self, r: &Ref, status: RefStatus) -> Result<Ref> {
        Ok(r.with_status(status))
    }

    fn status_of(&self, _hash: &Hash) -> Result<Option<RefStatus>> {
        Ok(None)
    }
}

fn ledger(accounts: usize) -> RadixMap {
    (0..accounts)
        .try_fold(RadixMap::new(), |map, i| {
            let key = format!("acct/{:05}", i).into_bytes();
            map.assoc(key, Cell::integer(i as i64 * 10).to_ref())
        })
        .unwrap()
}

fn read_all(map: &RadixMap, accounts: usize) {
    for i in 0..accounts {
        let key = format!("acct/{:05}", i).into_bytes();
        let value = map.get(&key).unwrap().unwrap().value().unwrap();
        assert_eq!(value.as_integer(), Some(i as i64 * 10));
    }
}

#[test]
fn test_each_cell_fetched_once() {
    let map = ledger(500);
    let store = Arc::new(CountingStore::default());
    persist(store.as_ref(), &map.to_ref()).unwrap();

    let loader = Loader::new(store.clone(), 10_000).unwrap();
    let remote = RadixMap::from_ref(&loader.soft_ref(map.hash())).unwrap();
    read_all(&remote, 500);

    let first_pass = store.fetches();
    assert!(first_pass > 1);
    assert_eq!(first_pass, loader.stats().misses);

    read_all(&remote, 500);
    assert_eq!(store.fetches(), first_pass);
    assert!(loader.stats().hits > 0);
}

#[test]
fn test_missing_then_available() {
    let store = Arc::new(CountingStore::default());
    let loader = Loader::new(store.clone(), 64).unwrap();
    let blob = Cell::blob(vec![0x5A; 600]).unwrap();

    let soft = loader.soft_ref(blob.hash());
    match soft.value() {
        Err(Error::MissingData(h)) => assert_eq!(h, blob.hash()),
        other => panic!("expected missing data, got {:?}", other),
    }

    // absence is not cached; the same ref succeeds once the data arrives
    persist(store.as_ref(), &blob.to_ref()).unwrap();
    let resolved = soft.value().unwrap();
    assert_eq!(resolved.as_blob().map(|b| b.len()), Some(600));
    assert_eq!(store.fetches(), 2);
}

#[test]
fn test_wrong_cell_from_store_is_corruption() {
    let decoy = Cell::string("not what you asked for").unwrap();
    let loader = Loader::new(Arc::new(LyingStore { decoy }), 16).unwrap();

    let wanted = Hash::digest(b"some other encoding");
    let err = loader.load(&wanted).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
    assert!(loader.cached(&wanted).is_none());
}

#[test]
fn test_tiny_cache_still_resolves() {
    let map = ledger(200);
    let store = Arc::new(CountingStore::default());
    persist(store.as_ref(), &map.to_ref()).unwrap();

    let loader = Loader::new(store.clone(), 1).unwrap();
    let remote = RadixMap::from_ref(&loader.soft_ref(map.hash())).unwrap();
    read_all(&remote, 200);

    assert_eq!(loader.cache_len(), 1);
    assert_eq!(store.fetches(), loader.stats().misses);
}

#[test]
fn test_file_store_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.cells");
    let config = Config::default();
    let map = ledger(500);

    {
        let store = FileStore::create(&path, &config).unwrap();
        let r = persist(&store, &map.to_ref()).unwrap();
        assert_eq!(r.status(), RefStatus::Persisted);
        store.sync().unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(FileStore::open(&path, &config).unwrap());
    assert_eq!(
        store.status_of(&map.hash()).unwrap(),
        Some(RefStatus::Persisted)
    );

    let loader = Loader::with_config(store, &config).unwrap();
    let remote = RadixMap::from_ref(&loader.soft_ref(map.hash())).unwrap();
    assert_eq!(remote.count(), 500);
    assert_eq!(remote.hash(), map.hash());
    read_all(&remote, 500);

    let keys = remote.keys().unwrap();
    assert_eq!(keys.first().map(|k| k.as_ref()), Some(&b"acct/00000"[..]));
    assert_eq!(keys.last().map(|k| k.as_ref()), Some(&b"acct/00499"[..]));
}

#[test]
fn test_concurrent_readers_share_loader() {
    let map = ledger(300);
    let store = Arc::new(CountingStore::default());
    persist(store.as_ref(), &map.to_ref()).unwrap();

    let loader = Loader::new(store.clone(), 10_000).unwrap();
    let remote = RadixMap::from_ref(&loader.soft_ref(map.hash())).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| read_all(&remote, 300));
        }
    });

    let stats = loader.stats();
    assert_eq!(stats.misses, store.fetches());
    assert!(stats.hits > 0);
}

#[test]
fn test_small_cell_identity_independent_of_ref_kind() {
    let store = Arc::new(CountingStore::default());
    let small = Cell::integer(7);
    persist(store.as_ref(), &small.to_ref()).unwrap();
    let loader = Loader::new(store, 16).unwrap();
    let soft = || loader.soft_ref(small.hash());

    let direct_vec = Cell::vector(vec![small.to_ref(), Cell::nil().to_ref()]).unwrap();
    let soft_vec = Cell::vector(vec![soft(), Cell::nil().to_ref()]).unwrap();
    assert_eq!(soft_vec.hash(), direct_vec.hash());
    assert_eq!(soft_vec.encoding(), direct_vec.encoding());
    assert!(soft_vec.is_embedded());

    let direct_map = RadixMap::new().assoc(&b"acct"[..], small.to_ref()).unwrap();
    let soft_map = RadixMap::new().assoc(&b"acct"[..], soft()).unwrap();
    assert_eq!(soft_map.hash(), direct_map.hash());
    assert_eq!(soft_map.cell().encoding(), direct_map.cell().encoding());

    let direct_set = RadixSet::new().conj(small.to_ref()).unwrap();
    let soft_set = RadixSet::new().conj(soft()).unwrap();
    assert_eq!(soft_set.hash(), direct_set.hash());
    assert_eq!(soft_set.cell().encoding(), direct_set.cell().encoding());
}

#[test]
fn test_hash_marker_to_small_cell_rejected() {
    let store = Arc::new(CountingStore::default());
    persist(store.as_ref(), &Cell::nil().to_ref()).unwrap();
    let loader = Loader::new(store, 16).unwrap();

    let mut bytes = vec![tag::VECTOR, 0x01, tag::REF];
    bytes.extend_from_slice(Cell::nil().hash().as_bytes());
    let outer = loader.decode(&bytes).unwrap();

    let child = outer.child_refs()[0].clone();
    assert!(child.value().unwrap_err().is_format());
    // a root lookup by hash is still fine
    assert!(loader.soft_ref(Cell::nil().hash()).value().unwrap().is_embedded());
}

#[test]
fn test_detached_refs_rejected_by_constructors() {
    let big = Cell::blob(vec![1u8; 500]).unwrap();
    let err = Cell::vector(vec![Ref::detached(big.hash())]).unwrap_err();
    assert!(err.is_missing_data());
}

#[test]
fn test_set_union_fetches_only_touched_path() {
    let base = (0..300).try_fold(RadixSet::new(), |s, i| s.conj_cell(Cell::integer(i))).unwrap();
    let store = Arc::new(CountingStore::default());
    persist(store.as_ref(), &base.to_ref()).unwrap();
    let loader = Loader::new(store.clone(), 1024).unwrap();

    let remote = RadixSet::from_cell(loader.decode(base.cell().encoding()).unwrap()).unwrap();
    let extra = RadixSet::new().conj_cell(Cell::integer(5000)).unwrap();
    let merged = remote.union(&extra).unwrap();

    assert_eq!(merged.count(), 301);
    assert_eq!(merged.hash(), base.conj_cell(Cell::integer(5000)).unwrap().hash());
    assert!(store.fetches() <= 2);
}
