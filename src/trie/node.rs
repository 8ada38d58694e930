//! Trie node types and their wire form

use super::digits::{self, has_prefix};
use crate::cell::{Encodable, RefContainer};
use crate::codec::{tag, write_blob, write_count, write_ref, Decoder, MAX_BLOB_LENGTH};
use crate::error::{Error, Result};
use crate::model::HASH_LENGTH;
use crate::refs::Ref;
use bytes::Bytes;

/// Which collection a trie node belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrieKind {
    /// Keys are arbitrary non-empty byte strings, each with a value ref
    Map,
    /// Keys are element hashes; the element ref is the value
    Set,
}

impl TrieKind {
    pub fn tag(self) -> u8 {
        match self {
            TrieKind::Map => tag::MAP,
            TrieKind::Set => tag::SET,
        }
    }

    /// Deepest prefix a branch of this kind may carry, in digits
    pub fn max_depth(self) -> usize {
        match self {
            TrieKind::Map => MAX_BLOB_LENGTH * 2,
            TrieKind::Set => HASH_LENGTH * 2 - 1,
        }
    }
}

/// A key with its value ref
#[derive(Clone, Debug)]
pub struct Entry {
    key: Bytes,
    value: Ref,
}

impl Entry {
    pub fn new(key: Bytes, value: Ref) -> Self {
        Entry { key, value }
    }

    /// Set entry: keyed by the element's hash
    pub fn element(value: Ref) -> Self {
        let key = Bytes::copy_from_slice(value.hash().as_bytes());
        Entry { key, value }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Ref {
        &self.value
    }

    pub fn into_parts(self) -> (Bytes, Ref) {
        (self.key, self.value)
    }
}

/// Interior node: every key below shares the first `depth` digits
#[derive(Clone, Debug)]
pub struct Branch {
    pub(crate) depth: usize,
    pub(crate) prefix: Bytes,
    /// Entry whose key is exactly the prefix (maps only)
    pub(crate) entry: Option<Entry>,
    /// Sorted by digit, at most one ref per digit
    pub(crate) children: Vec<(u8, Ref)>,
    pub(crate) count: u64,
}

impl Branch {
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn prefix(&self) -> &Bytes {
        &self.prefix
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    pub fn children(&self) -> &[(u8, Ref)] {
        &self.children
    }

    pub fn child(&self, digit: u8) -> Option<&Ref> {
        self.children
            .binary_search_by_key(&digit, |(d, _)| *d)
            .ok()
            .map(|i| &self.children[i].1)
    }

    /// Bit `d` set for each occupied child digit `d`
    pub fn mask(&self) -> u16 {
        self.children
            .iter()
            .fold(0u16, |m, (d, _)| m | (1 << *d))
    }

    /// Children with `digit` replaced or added
    pub(crate) fn with_child(&self, digit: u8, r: Ref) -> Vec<(u8, Ref)> {
        let mut children = self.children.clone();
        match children.binary_search_by_key(&digit, |(d, _)| *d) {
            Ok(i) => children[i].1 = r,
            Err(i) => children.insert(i, (digit, r)),
        }
        children
    }

    pub(crate) fn without_child(&self, digit: u8) -> Vec<(u8, Ref)> {
        self.children
            .iter()
            .filter(|(d, _)| *d != digit)
            .cloned()
            .collect()
    }

    fn read(d: &mut Decoder<'_>, kind: TrieKind, count: u64) -> Result<Self> {
        let depth = d.read_count()?;
        if depth > kind.max_depth() as u64 {
            return Err(Error::format(format!("branch depth {} too deep", depth)));
        }
        let depth = depth as usize;

        let prefix = Bytes::copy_from_slice(d.read_bytes(depth.div_ceil(2))?);
        if depth % 2 == 1 && prefix.last().is_some_and(|b| b & 0x0F != 0) {
            return Err(Error::format("non-zero padding nibble in branch prefix"));
        }

        let mask_bytes = d.read_bytes(2)?;
        let mask = u16::from_be_bytes([mask_bytes[0], mask_bytes[1]]);

        let entry = match kind {
            TrieKind::Set => None,
            TrieKind::Map => match d.read_byte()? {
                0 => None,
                1 => {
                    if depth == 0 || depth % 2 == 1 {
                        return Err(Error::format("branch entry must sit at a whole-byte depth"));
                    }
                    Some(Entry::new(prefix.clone(), d.read_ref()?))
                }
                other => {
                    return Err(Error::format(format!("bad branch entry flag {}", other)));
                }
            },
        };

        let mut children = Vec::with_capacity(mask.count_ones() as usize);
        for digit in 0..16u8 {
            if mask & (1 << digit) != 0 {
                children.push((digit, d.read_ref()?));
            }
        }

        let slots = children.len() + usize::from(entry.is_some());
        if children.is_empty() || slots < 2 {
            return Err(Error::format("branch with fewer than two occupants"));
        }
        if count < slots as u64 {
            return Err(Error::format(format!(
                "branch count {} below its {} occupants",
                count, slots
            )));
        }

        let branch = Branch {
            depth,
            prefix,
            entry,
            children,
            count,
        };
        branch.check_embedded_children(kind)?;
        Ok(branch)
    }

    /// In-memory children must extend this prefix at their own digit and
    /// their counts must add up
    fn check_embedded_children(&self, kind: TrieKind) -> Result<()> {
        let mut total = u64::from(self.entry.is_some());
        let mut all_known = true;
        for (digit, r) in &self.children {
            let Some(cell) = r.direct_value() else {
                all_known = false;
                continue;
            };
            let node = cell
                .trie_node()
                .filter(|n| n.kind == kind)
                .ok_or_else(|| Error::format("branch child is not a node of the same trie"))?;
            if node.is_empty() {
                return Err(Error::format("empty node as branch child"));
            }
            let (path, path_depth) = node.path();
            if path_depth <= self.depth
                || !has_prefix(path, &self.prefix, self.depth)
                || digits::digit(path, self.depth) != *digit
            {
                return Err(Error::format("branch child does not extend its prefix"));
            }
            total = total.saturating_add(node.count());
        }
        if all_known && total != self.count {
            return Err(Error::format(format!(
                "branch count {} does not match children total {}",
                self.count, total
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Body {
    Empty,
    Leaf(Entry),
    Branch(Branch),
}

/// A node of a map or set trie
#[derive(Clone, Debug)]
pub struct TrieNode {
    pub(crate) kind: TrieKind,
    pub(crate) body: Body,
}

impl TrieNode {
    pub fn empty(kind: TrieKind) -> Self {
        TrieNode {
            kind,
            body: Body::Empty,
        }
    }

    pub fn leaf(kind: TrieKind, entry: Entry) -> Self {
        TrieNode {
            kind,
            body: Body::Leaf(entry),
        }
    }

    pub(crate) fn branch(kind: TrieKind, branch: Branch) -> Self {
        TrieNode {
            kind,
            body: Body::Branch(branch),
        }
    }

    pub fn kind(&self) -> TrieKind {
        self.kind
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Entries in this subtree
    pub fn count(&self) -> u64 {
        match &self.body {
            Body::Empty => 0,
            Body::Leaf(_) => 1,
            Body::Branch(b) => b.count,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, Body::Empty)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Leaf(_))
    }

    /// Key bits every entry below shares, and how many digits of them
    pub fn path(&self) -> (&[u8], usize) {
        match &self.body {
            Body::Empty => (&[], 0),
            Body::Leaf(e) => (&e.key, e.key.len() * 2),
            Body::Branch(b) => (&b.prefix, b.depth),
        }
    }

    pub(crate) fn read(d: &mut Decoder<'_>, kind: TrieKind) -> Result<Self> {
        let count = d.read_count()?;
        match count {
            0 => Ok(TrieNode::empty(kind)),
            1 => {
                let entry = match kind {
                    TrieKind::Map => {
                        let n = d.read_len(MAX_BLOB_LENGTH)?;
                        if n == 0 {
                            return Err(Error::format("empty map key"));
                        }
                        let key = Bytes::copy_from_slice(d.read_bytes(n)?);
                        Entry::new(key, d.read_ref()?)
                    }
                    TrieKind::Set => Entry::element(d.read_ref()?),
                };
                Ok(TrieNode::leaf(kind, entry))
            }
            _ => Ok(TrieNode::branch(kind, Branch::read(d, kind, count)?)),
        }
    }
}

impl Encodable for TrieNode {
    fn write_encoding(&self, out: &mut Vec<u8>) {
        out.push(self.kind.tag());
        match &self.body {
            Body::Empty => write_count(out, 0),
            Body::Leaf(e) => {
                write_count(out, 1);
                if self.kind == TrieKind::Map {
                    write_blob(out, &e.key);
                }
                write_ref(out, &e.value);
            }
            Body::Branch(b) => {
                write_count(out, b.count);
                write_count(out, b.depth as u64);
                out.extend_from_slice(&b.prefix);
                out.extend_from_slice(&b.mask().to_be_bytes());
                if self.kind == TrieKind::Map {
                    match &b.entry {
                        Some(e) => {
                            out.push(1);
                            write_ref(out, &e.value);
                        }
                        None => out.push(0),
                    }
                }
                for (_, r) in &b.children {
                    write_ref(out, r);
                }
            }
        }
    }
}

impl RefContainer for TrieNode {
    fn child_refs(&self) -> Vec<&Ref> {
        match &self.body {
            Body::Empty => Vec::new(),
            Body::Leaf(e) => vec![&e.value],
            Body::Branch(b) => b
                .entry
                .iter()
                .map(|e| &e.value)
                .chain(b.children.iter().map(|(_, r)| r))
                .collect(),
        }
    }
}
