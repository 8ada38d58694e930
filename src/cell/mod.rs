//! Immutable content-addressed cells
//!
//! A [`Cell`] owns one [`Value`] and lazily memoises three derived facts:
//! its canonical encoding, its hash and whether it is embedded. Each is
//! computed at most once and never changes afterwards, so cells can be
//! shared freely across threads behind an `Arc`.

mod intern;
mod value;

pub use intern::{intern, SymbolTable};
pub use value::Value;

use crate::codec::{
    CANONICAL_NAN_BITS, MAX_BLOB_LENGTH, MAX_EMBEDDED_LENGTH, MAX_FIELDS, MAX_SYMBOL_LENGTH,
};
use crate::error::{Error, Result};
use crate::model::Hash;
use crate::refs::Ref;
use crate::trie::TrieNode;
use bytes::Bytes;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Anything with a canonical byte encoding
pub trait Encodable {
    /// Append the canonical encoding to `out`
    fn write_encoding(&self, out: &mut Vec<u8>);

    fn to_encoding(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_encoding(&mut out);
        out
    }
}

/// Anything that holds refs to child cells
pub trait RefContainer {
    /// Child refs in encoding order
    fn child_refs(&self) -> Vec<&Ref>;

    fn ref_count(&self) -> usize {
        self.child_refs().len()
    }
}

/// Anything identified by a content hash
pub trait Hashable {
    fn content_hash(&self) -> Hash;
}

/// An immutable value plus its memoised encoding, hash and embedding flag
pub struct Cell {
    value: Value,
    encoding: OnceLock<Bytes>,
    hash: OnceLock<Hash>,
    embedded: OnceLock<bool>,
}

impl Cell {
    /// Wrap a value that already satisfies the format limits
    pub(crate) fn new(value: Value) -> Self {
        Cell {
            value,
            encoding: OnceLock::new(),
            hash: OnceLock::new(),
            embedded: OnceLock::new(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn tag(&self) -> u8 {
        self.value.tag()
    }

    /// Canonical encoding, computed on first use
    pub fn encoding(&self) -> &Bytes {
        self.encoding
            .get_or_init(|| Bytes::from(self.value.to_encoding()))
    }

    pub fn encoding_length(&self) -> usize {
        self.encoding().len()
    }

    /// BLAKE3 hash of the encoding, computed on first use
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| Hash::digest(self.encoding()))
    }

    /// The hash if it has already been computed
    pub fn cached_hash(&self) -> Option<Hash> {
        self.hash.get().copied()
    }

    /// True when the encoding is short enough to inline and every child
    /// ref is itself embedded. Evaluated once per cell.
    pub fn is_embedded(&self) -> bool {
        *self.embedded.get_or_init(|| {
            self.value.child_refs().iter().all(|r| r.is_embedded())
                && self.encoding().len() <= MAX_EMBEDDED_LENGTH
        })
    }

    /// Trie node, if this is a map or set cell
    pub fn trie_node(&self) -> Option<&TrieNode> {
        match &self.value {
            Value::Map(node) | Value::Set(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            Value::Symbol(s) | Value::Keyword(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match &self.value {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Direct ref to this cell
    pub fn to_ref(self: &Arc<Self>) -> Ref {
        Ref::direct(self.clone())
    }

    pub fn ptr_eq(a: &Arc<Cell>, b: &Arc<Cell>) -> bool {
        Arc::ptr_eq(a, b)
    }

    // === Constructors ===

    pub fn nil() -> Arc<Cell> {
        Arc::new(Cell::new(Value::Nil))
    }

    pub fn boolean(b: bool) -> Arc<Cell> {
        Arc::new(Cell::new(Value::Bool(b)))
    }

    pub fn integer(i: i64) -> Arc<Cell> {
        Arc::new(Cell::new(Value::Integer(i)))
    }

    /// Any NaN is stored as the canonical NaN
    pub fn double(d: f64) -> Arc<Cell> {
        let d = if d.is_nan() {
            f64::from_bits(CANONICAL_NAN_BITS)
        } else {
            d
        };
        Arc::new(Cell::new(Value::Double(d)))
    }

    pub fn string(s: impl Into<String>) -> Result<Arc<Cell>> {
        let s = s.into();
        check_len("string", s.len(), MAX_BLOB_LENGTH)?;
        Ok(Arc::new(Cell::new(Value::String(s))))
    }

    pub fn blob(data: impl Into<Bytes>) -> Result<Arc<Cell>> {
        let data = data.into();
        check_len("blob", data.len(), MAX_BLOB_LENGTH)?;
        Ok(Arc::new(Cell::new(Value::Blob(data))))
    }

    /// Interned symbol
    pub fn symbol(name: &str) -> Result<Arc<Cell>> {
        check_name(name)?;
        Ok(Arc::new(Cell::new(Value::Symbol(intern(name)))))
    }

    /// Interned keyword
    pub fn keyword(name: &str) -> Result<Arc<Cell>> {
        check_name(name)?;
        Ok(Arc::new(Cell::new(Value::Keyword(intern(name)))))
    }

    /// Vector of up to 16 refs. Soft refs to embeddable cells are
    /// resolved and inlined.
    pub fn vector(items: Vec<Ref>) -> Result<Arc<Cell>> {
        check_len("vector", items.len(), MAX_FIELDS)?;
        let items = canonical_refs(items)?;
        Ok(Arc::new(Cell::new(Value::Vector(items))))
    }

    /// Record of `kind` (0..=15) with up to 16 fields
    pub fn record(kind: u8, fields: Vec<Ref>) -> Result<Arc<Cell>> {
        check_nibble("record kind", kind)?;
        check_len("record", fields.len(), MAX_FIELDS)?;
        let fields = canonical_refs(fields)?;
        Ok(Arc::new(Cell::new(Value::Record { kind, fields })))
    }

    /// Code cell for `opcode` (0..=15) with up to 16 operands
    pub fn code(opcode: u8, operands: Vec<Ref>) -> Result<Arc<Cell>> {
        check_nibble("opcode", opcode)?;
        check_len("code", operands.len(), MAX_FIELDS)?;
        let operands = canonical_refs(operands)?;
        Ok(Arc::new(Cell::new(Value::Code { opcode, operands })))
    }

    pub fn extension(kind: u8, value: u64) -> Result<Arc<Cell>> {
        check_nibble("extension kind", kind)?;
        Ok(Arc::new(Cell::new(Value::Extension { kind, value })))
    }
}

impl RefContainer for Cell {
    fn child_refs(&self) -> Vec<&Ref> {
        self.value.child_refs()
    }
}

impl Hashable for Cell {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

/// Content equality: same encoding means same value
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.cached_hash(), other.cached_hash()) {
            return a == b;
        }
        self.encoding() == other.encoding()
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("tag", &format_args!("{:#04x}", self.tag()))
            .field("value", &self.value)
            .finish()
    }
}

// === Internal helpers ===

fn check_len(what: &str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::invalid(format!(
            "{} length {} exceeds limit {}",
            what, len, max
        )));
    }
    Ok(())
}

fn check_nibble(what: &str, v: u8) -> Result<()> {
    if v > 0x0F {
        return Err(Error::invalid(format!("{} {} out of range 0..=15", what, v)));
    }
    Ok(())
}

fn canonical_refs(refs: Vec<Ref>) -> Result<Vec<Ref>> {
    refs.iter().map(Ref::canonical).collect()
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("empty symbol name"));
    }
    check_len("symbol", name.len(), MAX_SYMBOL_LENGTH)
}
