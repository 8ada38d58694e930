//! References to cells
//!
//! A [`Ref`] either holds its target in memory (direct) or only knows the
//! target's hash (soft). Soft refs resolve lazily through a [`Loader`];
//! a soft ref with no loader is detached and always reports
//! [`Error::MissingData`] when asked for its value.
//!
//! Whether a child is inlined into its parent depends only on its target,
//! never on how the ref holds it. [`Ref::canonical`] turns a soft ref to
//! an embeddable cell into a direct one before it is placed in a parent.

mod status;

pub use status::RefStatus;

use crate::cell::{Cell, Hashable};
use crate::codec::REF_LENGTH;
use crate::error::{Error, Result};
use crate::model::Hash;
use crate::store::Loader;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Target {
    Direct(Arc<Cell>),
    Soft {
        hash: Hash,
        loader: Option<Arc<Loader>>,
        /// Read from a `REF` marker, so the target must not be embeddable
        by_marker: bool,
    },
}

/// Pointer to a cell, tagged with a storage status
#[derive(Clone)]
pub struct Ref {
    status: RefStatus,
    target: Target,
}

impl Ref {
    /// Ref to a cell already in memory. Embeddable cells start at
    /// [`RefStatus::Embedded`].
    pub fn direct(cell: Arc<Cell>) -> Self {
        let status = if cell.is_embedded() {
            RefStatus::Embedded
        } else {
            RefStatus::Unknown
        };
        Ref {
            status,
            target: Target::Direct(cell),
        }
    }

    /// Ref that resolves `hash` through `loader` on demand
    pub fn soft(hash: Hash, loader: Arc<Loader>) -> Self {
        Ref {
            status: RefStatus::Unknown,
            target: Target::Soft {
                hash,
                loader: Some(loader),
                by_marker: false,
            },
        }
    }

    /// Soft ref with nowhere to load from
    pub fn detached(hash: Hash) -> Self {
        Ref {
            status: RefStatus::Unknown,
            target: Target::Soft {
                hash,
                loader: None,
                by_marker: false,
            },
        }
    }

    /// Child ref decoded from `[REF][hash]`
    pub(crate) fn from_marker(hash: Hash, loader: Option<&Arc<Loader>>) -> Self {
        Ref {
            status: RefStatus::Unknown,
            target: Target::Soft {
                hash,
                loader: loader.cloned(),
                by_marker: true,
            },
        }
    }

    pub fn status(&self) -> RefStatus {
        self.status
    }

    /// Copy of this ref with status raised to at least `status`
    pub fn with_status(&self, status: RefStatus) -> Ref {
        Ref {
            status: self.status.max(status),
            target: self.target.clone(),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.target, Target::Direct(_))
    }

    pub fn is_soft(&self) -> bool {
        !self.is_direct()
    }

    /// Target hash. For direct refs this may compute the target's encoding.
    pub fn hash(&self) -> Hash {
        match &self.target {
            Target::Direct(cell) => cell.hash(),
            Target::Soft { hash, .. } => *hash,
        }
    }

    /// Target hash if known without computation
    pub fn cached_hash(&self) -> Option<Hash> {
        match &self.target {
            Target::Direct(cell) => cell.cached_hash(),
            Target::Soft { hash, .. } => Some(*hash),
        }
    }

    /// Resolve the target, loading it if this is a soft ref
    pub fn value(&self) -> Result<Arc<Cell>> {
        match &self.target {
            Target::Direct(cell) => Ok(cell.clone()),
            Target::Soft {
                hash,
                loader: Some(loader),
                by_marker,
            } => {
                if *by_marker {
                    loader.load_child(hash)
                } else {
                    loader.load(hash)
                }
            }
            Target::Soft { hash, loader: None, .. } => Err(Error::MissingData(*hash)),
        }
    }

    /// The target if it is available without touching a store
    pub fn peek_value(&self) -> Option<Arc<Cell>> {
        match &self.target {
            Target::Direct(cell) => Some(cell.clone()),
            Target::Soft {
                hash,
                loader: Some(loader),
                ..
            } => loader.cached(hash),
            Target::Soft { loader: None, .. } => None,
        }
    }

    /// This ref in the form a parent must hold it: a soft ref whose target
    /// is embeddable is replaced by a direct ref
    ///
    /// Soft refs are resolved to find out. A detached ref cannot be
    /// checked and fails with [`Error::MissingData`].
    pub fn canonical(&self) -> Result<Ref> {
        if self.is_direct() {
            return Ok(self.clone());
        }
        let cell = self.value()?;
        if cell.is_embedded() {
            return Ok(Ref::direct(cell).with_status(self.status));
        }
        Ok(self.clone())
    }

    /// The target if it is held in memory
    pub fn direct_value(&self) -> Option<&Arc<Cell>> {
        match &self.target {
            Target::Direct(cell) => Some(cell),
            Target::Soft { .. } => None,
        }
    }

    /// Only direct refs are inlined; see [`Ref::canonical`]
    pub fn is_embedded(&self) -> bool {
        self.embedded_cell().is_some()
    }

    /// The target if it is inlined into a parent's encoding
    pub fn embedded_cell(&self) -> Option<&Arc<Cell>> {
        match &self.target {
            Target::Direct(cell) if cell.is_embedded() => Some(cell),
            _ => None,
        }
    }

    /// Bytes this ref occupies inside a parent's encoding
    pub fn encoded_length(&self) -> usize {
        match self.embedded_cell() {
            Some(cell) => cell.encoding_length(),
            None => REF_LENGTH,
        }
    }

    /// Direct ref to the same target, keeping status
    pub fn to_direct(&self) -> Result<Ref> {
        if self.is_direct() {
            return Ok(self.clone());
        }
        Ok(Ref {
            status: self.status,
            target: Target::Direct(self.value()?),
        })
    }
}

impl From<Arc<Cell>> for Ref {
    fn from(cell: Arc<Cell>) -> Self {
        Ref::direct(cell)
    }
}

impl Hashable for Ref {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

/// Refs are equal when their targets are equal, regardless of status
impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.cached_hash(), other.cached_hash()) {
            return a == b;
        }
        match (&self.target, &other.target) {
            (Target::Direct(a), Target::Direct(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self.hash() == other.hash(),
        }
    }
}

impl Eq for Ref {}

impl std::hash::Hash for Ref {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Ref::hash(self).hash(state);
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Direct(cell) => write!(f, "Ref::Direct({:?}, {})", cell, self.status),
            Target::Soft { hash, loader, .. } => write!(
                f,
                "Ref::Soft({}, {}{})",
                hash.short(),
                self.status,
                if loader.is_none() { ", detached" } else { "" }
            ),
        }
    }
}
