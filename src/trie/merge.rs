//! Structural set algebra
//!
//! Union, intersection and both differences are one walk over two tries,
//! parameterised by what to do with an element found on the left only, on
//! the right only or on both sides. Subtrees with equal hashes are decided
//! without being opened, and whole one-sided subtrees are kept or dropped
//! by ref, without being loaded.

use super::digits::{common_digits, digit, prefix_bytes};
use super::node::{Body, Branch, TrieKind};
use super::tree::{count_of, empty, node_of, resolve, wrap};
use super::TrieNode;
use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::refs::Ref;
use bytes::Bytes;
use std::sync::Arc;

const KIND: TrieKind = TrieKind::Set;

/// Where an element was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Left,
    Right,
    Both,
}

/// What a set operation does with an element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    KeepLeft,
    KeepRight,
    /// Both sides hold equal content; the left instance is kept
    KeepEither,
    Drop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    /// Left minus right
    Difference,
    /// Right minus left
    RightDifference,
}

impl SetOp {
    /// Decode a numeric operator code
    ///
    /// # Panics
    ///
    /// On any code other than 0..=3. Callers must only pass codes they got
    /// from [`SetOp::code`].
    pub fn from_code(code: u8) -> SetOp {
        match code {
            0 => SetOp::Union,
            1 => SetOp::Intersect,
            2 => SetOp::Difference,
            3 => SetOp::RightDifference,
            other => panic!("invalid set operation code {}", other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SetOp::Union => 0,
            SetOp::Intersect => 1,
            SetOp::Difference => 2,
            SetOp::RightDifference => 3,
        }
    }

    pub fn outcome(self, presence: Presence) -> Outcome {
        use Outcome::*;
        use Presence::*;
        match (self, presence) {
            (SetOp::Union, Left) => KeepLeft,
            (SetOp::Union, Right) => KeepRight,
            (SetOp::Union, Both) => KeepEither,
            (SetOp::Intersect, Both) => KeepEither,
            (SetOp::Intersect, _) => Drop,
            (SetOp::Difference, Left) => KeepLeft,
            (SetOp::Difference, _) => Drop,
            (SetOp::RightDifference, Right) => KeepRight,
            (SetOp::RightDifference, _) => Drop,
        }
    }
}

/// Combine two set tries under `op`
pub fn merge(left: &Arc<Cell>, right: &Arc<Cell>, op: SetOp) -> Result<Arc<Cell>> {
    let merged = merge_nodes(left, right, op)?;
    resolve(&merged.root, KIND)
}

/// A merged subtree and its element count
struct Merged {
    root: Ref,
    count: u64,
}

impl Merged {
    fn whole(cell: &Arc<Cell>) -> Result<Merged> {
        Ok(Merged {
            count: count_of(cell, KIND)?,
            root: Ref::direct(cell.clone()),
        })
    }

    fn nothing() -> Merged {
        Merged {
            root: Ref::direct(empty(KIND)),
            count: 0,
        }
    }
}

/// Child of a merged branch: digit, ref and count if already known
type Part = (u8, Ref, Option<u64>);

/// Element accounting for one input branch
///
/// Children passed over whole are not loaded, so their counts may be
/// unknown. The kept ones together hold the branch count minus every known
/// count, as long as no unknown child was dropped.
struct Tally {
    total: u64,
    known: u64,
    pending: bool,
    blind_drop: bool,
}

impl Tally {
    fn new(branch: &Branch) -> Self {
        Tally {
            total: branch.count,
            known: 0,
            pending: false,
            blind_drop: false,
        }
    }

    fn opened(&mut self, count: u64) {
        self.known = self.known.saturating_add(count);
    }

    fn kept(&mut self, parts: &mut Vec<Part>, digit: u8, r: &Ref) {
        let count = known_count(r);
        match count {
            Some(n) => self.opened(n),
            None => self.pending = true,
        }
        parts.push((digit, r.clone(), count));
    }

    fn dropped(&mut self, r: &Ref) {
        match known_count(r) {
            Some(n) => self.opened(n),
            None => self.blind_drop = true,
        }
    }

    fn skip(&mut self, parts: &mut Vec<Part>, digit: u8, r: &Ref, keep: bool) {
        if keep {
            self.kept(parts, digit, r);
        } else {
            self.dropped(r);
        }
    }
}

fn merge_nodes(left: &Arc<Cell>, right: &Arc<Cell>, op: SetOp) -> Result<Merged> {
    if Arc::ptr_eq(left, right) || left.hash() == right.hash() {
        return keep_both(left, right, op);
    }

    let a = node_of(left, KIND)?;
    let b = node_of(right, KIND)?;
    if a.is_empty() {
        return keep_one(right, Presence::Right, op);
    }
    if b.is_empty() {
        return keep_one(left, Presence::Left, op);
    }

    let (pa, da) = a.path();
    let (pb, db) = b.path();
    let limit = da.min(db);
    let shared = common_digits(pa, pb, limit);

    if shared < limit {
        // Disjoint key ranges: each side survives or vanishes whole
        let l = keep_one(left, Presence::Left, op)?;
        let r = keep_one(right, Presence::Right, op)?;
        let mut parts = Vec::with_capacity(2);
        for (m, d) in [(l, digit(pa, shared)), (r, digit(pb, shared))] {
            if m.count > 0 {
                parts.push((d, m.root, Some(m.count)));
            }
        }
        parts.sort_by_key(|(d, _, _)| *d);
        return assemble(shared, prefix_bytes(pa, shared), parts, &[]);
    }

    match (&a.body, &b.body) {
        // Equal hash keys: same element
        (Body::Leaf(_), Body::Leaf(_)) => keep_both(left, right, op),
        (Body::Branch(ba), Body::Branch(bb)) if da == db => merge_branches(left, ba, right, bb, op),
        (Body::Branch(ba), _) if da < db => {
            descend(left, ba, right, Presence::Right, digit(pb, da), op)
        }
        (_, Body::Branch(bb)) if db < da => {
            descend(right, bb, left, Presence::Left, digit(pa, db), op)
        }
        _ => Err(Error::invalid("set trie nodes with inconsistent shapes")),
    }
}

// === Internal helpers ===

fn keeps(op: SetOp, presence: Presence) -> bool {
    op.outcome(presence) != Outcome::Drop
}

fn keep_both(left: &Arc<Cell>, right: &Arc<Cell>, op: SetOp) -> Result<Merged> {
    match op.outcome(Presence::Both) {
        Outcome::KeepLeft | Outcome::KeepEither => Merged::whole(left),
        Outcome::KeepRight => Merged::whole(right),
        Outcome::Drop => Ok(Merged::nothing()),
    }
}

fn keep_one(side: &Arc<Cell>, presence: Presence, op: SetOp) -> Result<Merged> {
    if keeps(op, presence) {
        Merged::whole(side)
    } else {
        Ok(Merged::nothing())
    }
}

/// Count of a child's subtree if it is in memory or cached
fn known_count(r: &Ref) -> Option<u64> {
    let cell = r.peek_value()?;
    node_of(&cell, KIND).ok().map(|n| n.count())
}

/// Merge two branches at the same depth digit by digit
fn merge_branches(
    left: &Arc<Cell>,
    ba: &Branch,
    right: &Arc<Cell>,
    bb: &Branch,
    op: SetOp,
) -> Result<Merged> {
    let mut parts = Vec::with_capacity(16);
    let mut ta = Tally::new(ba);
    let mut tb = Tally::new(bb);
    for d in 0..16u8 {
        match (ba.child(d), bb.child(d)) {
            (None, None) => {}
            (Some(ra), None) => ta.skip(&mut parts, d, ra, keeps(op, Presence::Left)),
            (None, Some(rb)) => tb.skip(&mut parts, d, rb, keeps(op, Presence::Right)),
            (Some(ra), Some(rb)) if ra == rb => {
                // equal content: the left instance stands for both
                ta.skip(&mut parts, d, ra, keeps(op, Presence::Both));
                tb.dropped(rb);
            }
            (Some(ra), Some(rb)) => {
                let ca = resolve(ra, KIND)?;
                let cb = resolve(rb, KIND)?;
                ta.opened(count_of(&ca, KIND)?);
                tb.opened(count_of(&cb, KIND)?);
                let m = merge_nodes(&ca, &cb, op)?;
                if m.count > 0 {
                    parts.push((d, m.root, Some(m.count)));
                }
            }
        }
    }

    if same_children(ba, &parts) {
        return Ok(Merged {
            root: Ref::direct(left.clone()),
            count: ba.count,
        });
    }
    if same_children(bb, &parts) {
        return Ok(Merged {
            root: Ref::direct(right.clone()),
            count: bb.count,
        });
    }
    assemble(ba.depth, ba.prefix.clone(), parts, &[&ta, &tb])
}

/// Merge `other` into the one child of `branch` on its path; every other
/// child is kept or dropped whole
fn descend(
    original: &Arc<Cell>,
    branch: &Branch,
    other: &Arc<Cell>,
    other_side: Presence,
    at: u8,
    op: SetOp,
) -> Result<Merged> {
    let own_side = match other_side {
        Presence::Right => Presence::Left,
        _ => Presence::Right,
    };
    let mut parts = Vec::with_capacity(16);
    let mut tally = Tally::new(branch);
    for d in 0..16u8 {
        match (d == at, branch.child(d)) {
            (true, Some(c)) => {
                let child = resolve(c, KIND)?;
                tally.opened(count_of(&child, KIND)?);
                let m = match own_side {
                    Presence::Left => merge_nodes(&child, other, op)?,
                    _ => merge_nodes(other, &child, op)?,
                };
                if m.count > 0 {
                    parts.push((d, m.root, Some(m.count)));
                }
            }
            (true, None) => {
                let m = keep_one(other, other_side, op)?;
                if m.count > 0 {
                    parts.push((d, m.root, Some(m.count)));
                }
            }
            (false, Some(c)) => tally.skip(&mut parts, d, c, keeps(op, own_side)),
            (false, None) => {}
        }
    }

    if same_children(branch, &parts) {
        return Ok(Merged {
            root: Ref::direct(original.clone()),
            count: branch.count,
        });
    }
    assemble(branch.depth, branch.prefix.clone(), parts, &[&tally])
}

fn same_children(branch: &Branch, parts: &[Part]) -> bool {
    branch.children.len() == parts.len()
        && branch
            .children
            .iter()
            .zip(parts)
            .all(|((da, ra), (db, rb, _))| da == db && ra == rb)
}

/// Total elements under `parts`, loading only what cannot be derived
fn settle(parts: &mut [Part], tallies: &[&Tally]) -> Result<u64> {
    let mut count = 0u64;
    if tallies.iter().all(|t| !(t.pending && t.blind_drop)) {
        for t in tallies.iter().filter(|t| t.pending) {
            count += t.total.checked_sub(t.known).ok_or_else(|| {
                Error::Corruption("branch count below its children".into())
            })?;
        }
        count += parts.iter().filter_map(|(_, _, n)| *n).sum::<u64>();
        return Ok(count);
    }
    for (_, r, n) in parts.iter_mut() {
        let c = match n {
            Some(c) => *c,
            None => count_of(&*resolve(r, KIND)?, KIND)?,
        };
        *n = Some(c);
        count += c;
    }
    Ok(count)
}

/// Canonical node for merged children at `depth`: nothing becomes the
/// empty set and a single child replaces the branch
fn assemble(
    depth: usize,
    prefix: Bytes,
    mut parts: Vec<Part>,
    tallies: &[&Tally],
) -> Result<Merged> {
    let count = settle(&mut parts, tallies)?;
    if parts.len() < 2 {
        return Ok(match parts.pop() {
            None => Merged::nothing(),
            Some((_, root, _)) => Merged { root, count },
        });
    }
    let children = parts.into_iter().map(|(d, r, _)| (d, r)).collect();
    let cell = wrap(TrieNode::branch(
        KIND,
        Branch {
            depth,
            prefix,
            entry: None,
            children,
            count,
        },
    ));
    Ok(Merged {
        root: Ref::direct(cell),
        count,
    })
}
