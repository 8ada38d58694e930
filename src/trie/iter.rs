use super::node::{Body, Entry, TrieKind};
use super::tree::{node_of, resolve};
use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::refs::Ref;
use std::sync::Arc;

/// In-order walk over a trie's entries
///
/// Children are resolved lazily as the walk reaches them. A child that
/// cannot be resolved yields its error once and ends the walk.
pub struct TrieIter {
    kind: TrieKind,
    /// Node plus the next position to visit (0 = branch entry)
    stack: Vec<(Arc<Cell>, usize)>,
}

enum Step {
    Yield(Entry),
    Descend(Ref),
    Pop,
    Continue,
    Fail(Error),
}

impl TrieIter {
    pub fn new(root: Arc<Cell>, kind: TrieKind) -> Self {
        TrieIter {
            kind,
            stack: vec![(root, 0)],
        }
    }
}

impl Iterator for TrieIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kind;
        loop {
            let (cell, pos) = self.stack.last_mut()?;
            let step = match node_of(cell, kind) {
                Err(e) => Step::Fail(e),
                Ok(node) => match &node.body {
                    Body::Empty => Step::Pop,
                    Body::Leaf(e) => {
                        if *pos == 0 {
                            *pos = 1;
                            Step::Yield(e.clone())
                        } else {
                            Step::Pop
                        }
                    }
                    Body::Branch(b) => {
                        let at = *pos;
                        *pos += 1;
                        if at == 0 {
                            match &b.entry {
                                Some(e) => Step::Yield(e.clone()),
                                None => Step::Continue,
                            }
                        } else {
                            match b.children.get(at - 1) {
                                Some((_, r)) => Step::Descend(r.clone()),
                                None => Step::Pop,
                            }
                        }
                    }
                },
            };

            match step {
                Step::Yield(e) => return Some(Ok(e)),
                Step::Descend(r) => match resolve(&r, kind) {
                    Ok(child) => self.stack.push((child, 0)),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(e));
                    }
                },
                Step::Pop => {
                    self.stack.pop();
                }
                Step::Continue => {}
                Step::Fail(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
