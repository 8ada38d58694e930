//! Persistent radix trie operations
//!
//! Every operation takes a root cell and leaves it untouched. Mutations
//! return `Ok(None)` when nothing changed so callers can keep the exact
//! root instance they already hold.

use super::digits::{common_digits, digit, digit_count, has_prefix, prefix_bytes};
use super::iter::TrieIter;
use super::node::{Body, Branch, Entry, TrieKind, TrieNode};
use crate::cell::{Cell, Value};
use crate::error::{Error, Result};
use crate::refs::Ref;
use bytes::Bytes;
use std::sync::{Arc, OnceLock};

static EMPTY_MAP: OnceLock<Arc<Cell>> = OnceLock::new();
static EMPTY_SET: OnceLock<Arc<Cell>> = OnceLock::new();

/// The shared empty trie of `kind`
pub fn empty(kind: TrieKind) -> Arc<Cell> {
    let slot = match kind {
        TrieKind::Map => &EMPTY_MAP,
        TrieKind::Set => &EMPTY_SET,
    };
    slot.get_or_init(|| wrap(TrieNode::empty(kind))).clone()
}

/// Look up the entry stored under `key`
pub fn get(root: &Arc<Cell>, kind: TrieKind, key: &[u8]) -> Result<Option<Entry>> {
    let mut cell = root.clone();
    loop {
        let next = {
            let node = node_of(&cell, kind)?;
            match &node.body {
                Body::Empty => return Ok(None),
                Body::Leaf(e) => return Ok((e.key().as_ref() == key).then(|| e.clone())),
                Body::Branch(b) => {
                    if !has_prefix(key, &b.prefix, b.depth) {
                        return Ok(None);
                    }
                    if digit_count(key) == b.depth {
                        return Ok(b.entry.clone());
                    }
                    match b.child(digit(key, b.depth)) {
                        Some(r) => r.clone(),
                        None => return Ok(None),
                    }
                }
            }
        };
        cell = resolve(&next, kind)?;
    }
}

/// Add or replace `entry`. `None` if the same key already maps to an
/// equal value.
///
/// The value ref is made canonical first, so a soft ref to an embeddable
/// cell is loaded and stored inline.
pub fn insert(root: &Arc<Cell>, kind: TrieKind, entry: Entry) -> Result<Option<Arc<Cell>>> {
    let (key, value) = entry.into_parts();
    insert_entry(root, kind, Entry::new(key, value.canonical()?))
}

fn insert_entry(root: &Arc<Cell>, kind: TrieKind, entry: Entry) -> Result<Option<Arc<Cell>>> {
    let node = node_of(root, kind)?;
    match &node.body {
        Body::Empty => Ok(Some(leaf(kind, entry))),
        Body::Leaf(existing) => {
            if existing.key() == entry.key() {
                if existing.value() == entry.value() {
                    return Ok(None);
                }
                return Ok(Some(leaf(kind, entry)));
            }
            let split = common_digits(existing.key(), entry.key(), usize::MAX);
            fork(kind, split, root, entry).map(Some)
        }
        Body::Branch(b) => {
            let shared = common_digits(&b.prefix, entry.key(), b.depth);
            if shared < b.depth {
                return fork(kind, shared, root, entry).map(Some);
            }

            if digit_count(entry.key()) == b.depth {
                if b.entry
                    .as_ref()
                    .is_some_and(|e| e.value() == entry.value())
                {
                    return Ok(None);
                }
                let count = b.count + u64::from(b.entry.is_none());
                return Ok(Some(branch_cell(
                    kind,
                    b,
                    Some(entry),
                    b.children.clone(),
                    count,
                )));
            }

            let d = digit(entry.key(), b.depth);
            let (children, count) = match b.child(d) {
                None => (b.with_child(d, Ref::direct(leaf(kind, entry))), b.count + 1),
                Some(child_ref) => {
                    let child = resolve(child_ref, kind)?;
                    let before = count_of(&child, kind)?;
                    let Some(updated) = insert_entry(&child, kind, entry)? else {
                        return Ok(None);
                    };
                    let after = count_of(&updated, kind)?;
                    (
                        b.with_child(d, Ref::direct(updated)),
                        adjust(b.count, before, after)?,
                    )
                }
            };
            Ok(Some(branch_cell(kind, b, b.entry.clone(), children, count)))
        }
    }
}

/// Remove `key`. `None` if it was absent.
pub fn remove(root: &Arc<Cell>, kind: TrieKind, key: &[u8]) -> Result<Option<Arc<Cell>>> {
    let node = node_of(root, kind)?;
    match &node.body {
        Body::Empty => Ok(None),
        Body::Leaf(e) => Ok((e.key().as_ref() == key).then(|| empty(kind))),
        Body::Branch(b) => {
            if !has_prefix(key, &b.prefix, b.depth) {
                return Ok(None);
            }
            if digit_count(key) == b.depth {
                if b.entry.is_none() {
                    return Ok(None);
                }
                let count = adjust(b.count, 1, 0)?;
                return build(kind, b.depth, b.prefix.clone(), None, b.children.clone(), count)
                    .map(Some);
            }

            let d = digit(key, b.depth);
            let Some(child_ref) = b.child(d) else {
                return Ok(None);
            };
            let child = resolve(child_ref, kind)?;
            let before = count_of(&child, kind)?;
            let Some(updated) = remove(&child, kind, key)? else {
                return Ok(None);
            };
            let after = count_of(&updated, kind)?;
            let children = if after == 0 {
                b.without_child(d)
            } else {
                b.with_child(d, Ref::direct(updated))
            };
            let count = adjust(b.count, before, after)?;
            build(kind, b.depth, b.prefix.clone(), b.entry.clone(), children, count).map(Some)
        }
    }
}

/// Entry at `index` in key order, found by descending through subtree counts
pub fn entry_at(root: &Arc<Cell>, kind: TrieKind, mut index: u64) -> Result<Option<Entry>> {
    let mut cell = root.clone();
    loop {
        let next = {
            let node = node_of(&cell, kind)?;
            if index >= node.count() {
                return Ok(None);
            }
            match &node.body {
                Body::Empty => return Ok(None),
                Body::Leaf(e) => return Ok(Some(e.clone())),
                Body::Branch(b) => {
                    if let Some(e) = &b.entry {
                        if index == 0 {
                            return Ok(Some(e.clone()));
                        }
                        index -= 1;
                    }
                    let mut found = None;
                    for (_, r) in &b.children {
                        let child = resolve(r, kind)?;
                        let n = count_of(&child, kind)?;
                        if index < n {
                            found = Some(child);
                            break;
                        }
                        index -= n;
                    }
                    found.ok_or_else(|| {
                        Error::Corruption("branch count exceeds its children".into())
                    })?
                }
            }
        };
        cell = next;
    }
}

/// All entries whose key starts with `prefix`, in key order
pub fn entries_with_prefix(root: &Arc<Cell>, kind: TrieKind, prefix: &[u8]) -> Result<Vec<Entry>> {
    let wanted = digit_count(prefix);
    let mut cell = root.clone();
    loop {
        let next = {
            let node = node_of(&cell, kind)?;
            match &node.body {
                Body::Empty => return Ok(Vec::new()),
                Body::Leaf(e) => {
                    let hit = e.key().starts_with(prefix);
                    return Ok(if hit { vec![e.clone()] } else { Vec::new() });
                }
                Body::Branch(b) => {
                    let limit = wanted.min(b.depth);
                    if common_digits(prefix, &b.prefix, limit) < limit {
                        return Ok(Vec::new());
                    }
                    if wanted <= b.depth {
                        break;
                    }
                    match b.child(digit(prefix, b.depth)) {
                        Some(r) => r.clone(),
                        None => return Ok(Vec::new()),
                    }
                }
            }
        };
        cell = resolve(&next, kind)?;
    }
    TrieIter::new(cell, kind).collect()
}

// === Internal helpers ===

pub(crate) fn wrap(node: TrieNode) -> Arc<Cell> {
    let value = match node.kind {
        TrieKind::Map => Value::Map(node),
        TrieKind::Set => Value::Set(node),
    };
    Arc::new(Cell::new(value))
}

/// The trie node inside `cell`, if it is one of `kind`
pub(crate) fn node_of(cell: &Cell, kind: TrieKind) -> Result<&TrieNode> {
    cell.trie_node()
        .filter(|n| n.kind == kind)
        .ok_or_else(|| {
            Error::invalid(format!(
                "expected {:?} trie node, found {}",
                kind,
                cell.value().type_name()
            ))
        })
}

/// Resolve a child ref and check it holds a node of `kind`
pub(crate) fn resolve(r: &Ref, kind: TrieKind) -> Result<Arc<Cell>> {
    let cell = r.value()?;
    node_of(&cell, kind)?;
    Ok(cell)
}

pub(crate) fn count_of(cell: &Cell, kind: TrieKind) -> Result<u64> {
    Ok(node_of(cell, kind)?.count())
}

fn leaf(kind: TrieKind, entry: Entry) -> Arc<Cell> {
    wrap(TrieNode::leaf(kind, entry))
}

/// Same prefix as `b` with new contents
fn branch_cell(
    kind: TrieKind,
    b: &Branch,
    entry: Option<Entry>,
    children: Vec<(u8, Ref)>,
    count: u64,
) -> Arc<Cell> {
    wrap(TrieNode::branch(
        kind,
        Branch {
            depth: b.depth,
            prefix: b.prefix.clone(),
            entry,
            children,
            count,
        },
    ))
}

/// Canonical node for a branch's contents: an emptied branch becomes the
/// empty trie, a lone entry becomes a leaf and a lone child replaces the
/// branch
pub(crate) fn build(
    kind: TrieKind,
    depth: usize,
    prefix: Bytes,
    entry: Option<Entry>,
    children: Vec<(u8, Ref)>,
    count: u64,
) -> Result<Arc<Cell>> {
    match (entry, children.len()) {
        (None, 0) => Ok(empty(kind)),
        (None, 1) => resolve(&children[0].1, kind),
        (Some(e), 0) => Ok(leaf(kind, e)),
        (entry, _) => Ok(wrap(TrieNode::branch(
            kind,
            Branch {
                depth,
                prefix,
                entry,
                children,
                count,
            },
        ))),
    }
}

/// New branch at `depth` holding the subtree `existing` and `entry`, whose
/// keys first differ at digit `depth`
fn fork(kind: TrieKind, depth: usize, existing: &Arc<Cell>, entry: Entry) -> Result<Arc<Cell>> {
    let node = node_of(existing, kind)?;
    let (path, path_depth) = node.path();
    let prefix = prefix_bytes(entry.key(), depth);

    let mut branch_entry = None;
    let mut children = Vec::with_capacity(2);
    if path_depth == depth {
        match &node.body {
            Body::Leaf(e) => branch_entry = Some(e.clone()),
            _ => return Err(Error::invalid("only a leaf can end at a fork point")),
        }
    } else {
        children.push((digit(path, depth), Ref::direct(existing.clone())));
    }
    if digit_count(entry.key()) == depth {
        branch_entry = Some(entry);
    } else {
        children.push((digit(entry.key(), depth), Ref::direct(leaf(kind, entry))));
    }
    children.sort_by_key(|(d, _)| *d);

    Ok(wrap(TrieNode::branch(
        kind,
        Branch {
            depth,
            prefix,
            entry: branch_entry,
            children,
            count: node.count() + 1,
        },
    )))
}

fn adjust(total: u64, before: u64, after: u64) -> Result<u64> {
    total
        .checked_sub(before)
        .map(|t| t + after)
        .ok_or_else(|| Error::Corruption("subtree count exceeds branch count".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn entry(key: &[u8], v: i64) -> Entry {
        Entry::new(Bytes::copy_from_slice(key), Cell::integer(v).to_ref())
    }

    fn build_map(keys: &[&[u8]]) -> Arc<Cell> {
        let mut root = empty(TrieKind::Map);
        for k in keys {
            root = insert(&root, TrieKind::Map, entry(k, k.len() as i64))
                .unwrap()
                .unwrap();
        }
        root
    }

    #[test]
    fn test_empty_is_shared() {
        assert!(Arc::ptr_eq(&empty(TrieKind::Map), &empty(TrieKind::Map)));
        assert!(!Arc::ptr_eq(&empty(TrieKind::Map), &empty(TrieKind::Set)));
        assert_eq!(empty(TrieKind::Set).encoding().as_ref(), &[0x83, 0x00]);
    }

    #[test]
    fn test_leaf_split_on_nibble() {
        let root = build_map(&[&[0x10], &[0x1F]]);
        let node = node_of(&root, TrieKind::Map).unwrap();
        let Body::Branch(b) = &node.body else {
            panic!("expected branch");
        };
        assert_eq!(b.depth, 1);
        assert_eq!(b.prefix.as_ref(), &[0x10]);
        assert_eq!(b.mask(), (1 << 0x0) | (1 << 0xF));
        assert_eq!(b.count, 2);
    }

    #[test]
    fn test_prefix_key_becomes_branch_entry() {
        let root = build_map(&[b"app", b"apple", b"apply"]);
        let node = node_of(&root, TrieKind::Map).unwrap();
        let Body::Branch(b) = &node.body else {
            panic!("expected branch");
        };
        assert_eq!(b.depth, 6);
        assert_eq!(b.entry.as_ref().unwrap().key().as_ref(), b"app");
        assert_eq!(node.count(), 3);

        let e = get(&root, TrieKind::Map, b"app").unwrap().unwrap();
        assert_eq!(e.value().value().unwrap().as_integer(), Some(3));
        assert!(get(&root, TrieKind::Map, b"ap").unwrap().is_none());
        assert!(get(&root, TrieKind::Map, b"apples").unwrap().is_none());
    }

    #[test]
    fn test_unchanged_insert_reports_none() {
        let root = build_map(&[b"a", b"b"]);
        assert!(insert(&root, TrieKind::Map, entry(b"a", 1)).unwrap().is_none());
        assert!(insert(&root, TrieKind::Map, entry(b"a", 9)).unwrap().is_some());
    }

    #[test]
    fn test_remove_collapses() {
        let root = build_map(&[&[0x10], &[0x1F], &[0x20]]);
        let removed = remove(&root, TrieKind::Map, &[0x1F]).unwrap().unwrap();
        let expected = build_map(&[&[0x10], &[0x20]]);
        assert_eq!(removed.hash(), expected.hash());

        let node = node_of(&removed, TrieKind::Map).unwrap();
        let Body::Branch(b) = &node.body else {
            panic!("expected branch");
        };
        assert_eq!(b.depth, 0);
        assert_eq!(b.mask(), (1 << 1) | (1 << 2));
        assert_eq!(node.count(), 2);

        assert!(remove(&root, TrieKind::Map, &[0x30]).unwrap().is_none());
    }

    #[test]
    fn test_remove_branch_entry() {
        let root = build_map(&[b"app", b"apple"]);
        let removed = remove(&root, TrieKind::Map, b"app").unwrap().unwrap();
        let node = node_of(&removed, TrieKind::Map).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.path().0, b"apple");
    }

    #[test]
    fn test_entry_at_and_prefix_scan() {
        let root = build_map(&[b"b", b"a", b"ab", b"c", b"aa"]);
        let keys: Vec<Vec<u8>> = (0..5)
            .map(|i| entry_at(&root, TrieKind::Map, i).unwrap().unwrap().key().to_vec())
            .collect();
        let expected: Vec<Vec<u8>> = ["a", "aa", "ab", "b", "c"]
            .iter()
            .map(|k| k.as_bytes().to_vec())
            .collect();
        assert_eq!(keys, expected);
        assert!(entry_at(&root, TrieKind::Map, 5).unwrap().is_none());

        let scan = entries_with_prefix(&root, TrieKind::Map, b"a").unwrap();
        assert_eq!(scan.len(), 3);
        assert!(entries_with_prefix(&root, TrieKind::Map, b"z").unwrap().is_empty());
        assert_eq!(entries_with_prefix(&root, TrieKind::Map, b"").unwrap().len(), 5);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let set = empty(TrieKind::Set);
        assert!(matches!(
            get(&set, TrieKind::Map, b"k"),
            Err(Error::InvalidStructure(_))
        ));
    }
}
