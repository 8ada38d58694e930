//! Canonical binary encoding
//!
//! Every value has exactly one encoding: `[tag][payload]`. Child refs are
//! either inlined as their own encoding (embedded) or written as
//! `[REF][32-byte hash]`. Decoding is strict: anything that would not
//! re-encode to the same bytes is rejected with [`Error::Format`].
//!
//! Child hashes that cannot be resolved are not a decode failure. They
//! become soft refs and only fail when somebody asks for their value.

pub mod tag;
pub mod vlq;

use crate::cell::{Cell, Value};
use crate::error::{Error, Result};
use crate::model::{Hash, HASH_LENGTH};
use crate::refs::{Ref, RefStatus};
use crate::store::Loader;
use crate::trie::{TrieKind, TrieNode};
use bytes::Bytes;
use std::sync::Arc;

pub use vlq::{write_count, write_long, MAX_VLQ_LENGTH};

/// Cells whose encoding is at most this long (and whose children are all
/// embedded) are inlined into their parent
pub const MAX_EMBEDDED_LENGTH: usize = 140;

/// Largest encoding accepted by [`decode`]
pub const MAX_ENCODING_LENGTH: usize = 16383;

/// Deepest nesting of inline children accepted by [`decode`]
pub const MAX_DECODE_DEPTH: usize = 128;

/// Longest blob, string or map key held in a single cell
pub const MAX_BLOB_LENGTH: usize = 4096;

/// Longest symbol or keyword name, in bytes
pub const MAX_SYMBOL_LENGTH: usize = 128;

/// Most child refs in a vector, record or code cell
pub const MAX_FIELDS: usize = 16;

/// The only NaN bit pattern allowed on the wire
pub const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

/// Encoded length of a non-embedded child: REF tag plus hash
pub const REF_LENGTH: usize = 1 + HASH_LENGTH;

/// Canonical encoding of a cell
pub fn encode(cell: &Cell) -> Bytes {
    cell.encoding().clone()
}

/// Decode a cell. Non-embedded children become detached soft refs that
/// report [`Error::MissingData`] until re-read through a [`Loader`].
pub fn decode(bytes: &[u8]) -> Result<Arc<Cell>> {
    decode_inner(bytes, None)
}

/// Decode a cell, binding non-embedded children to `loader`
pub fn decode_with(bytes: &[u8], loader: &Arc<Loader>) -> Result<Arc<Cell>> {
    decode_inner(bytes, Some(loader))
}

fn decode_inner(bytes: &[u8], loader: Option<&Arc<Loader>>) -> Result<Arc<Cell>> {
    if bytes.is_empty() {
        return Err(Error::format("empty encoding"));
    }
    if bytes.len() > MAX_ENCODING_LENGTH {
        return Err(Error::format(format!(
            "encoding of {} bytes exceeds limit of {}",
            bytes.len(),
            MAX_ENCODING_LENGTH
        )));
    }

    let mut decoder = Decoder::new(bytes, loader);
    let cell = decoder.read_cell()?;
    if decoder.remaining() != 0 {
        return Err(Error::format(format!(
            "{} trailing bytes after cell",
            decoder.remaining()
        )));
    }
    if cell.encoding().as_ref() != bytes {
        return Err(Error::format("non-canonical encoding"));
    }
    Ok(cell)
}

/// Write a child ref: inline if embedded, otherwise REF + hash
pub fn write_ref(out: &mut Vec<u8>, r: &Ref) {
    match r.embedded_cell() {
        Some(cell) => out.extend_from_slice(cell.encoding()),
        None => {
            out.push(tag::REF);
            out.extend_from_slice(r.hash().as_bytes());
        }
    }
}

/// Write a length-prefixed byte string
pub fn write_blob(out: &mut Vec<u8>, data: &[u8]) {
    write_count(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Cursor over an encoding
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
    loader: Option<&'a Arc<Loader>>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(input: &'a [u8], loader: Option<&'a Arc<Loader>>) -> Self {
        Decoder {
            input,
            pos: 0,
            depth: 0,
            loader,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or_else(|| Error::format("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn peek_byte(&self) -> Result<u8> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::format("unexpected end of input"))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::format(format!(
                "declared length {} exceeds remaining {} bytes",
                n,
                self.remaining()
            )));
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_count(&mut self) -> Result<u64> {
        let (value, used) = vlq::read_count(&self.input[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let (value, used) = vlq::read_long(&self.input[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Read a count that must not exceed `max`
    pub fn read_len(&mut self, max: usize) -> Result<usize> {
        let n = self.read_count()?;
        if n > max as u64 {
            return Err(Error::format(format!("length {} exceeds limit {}", n, max)));
        }
        Ok(n as usize)
    }

    pub fn read_hash(&mut self) -> Result<Hash> {
        let bytes = self.read_bytes(HASH_LENGTH)?;
        Hash::from_slice(bytes).ok_or_else(|| Error::format("bad hash length"))
    }

    /// Read a child ref written by [`write_ref`]
    pub fn read_ref(&mut self) -> Result<Ref> {
        if self.peek_byte()? == tag::REF {
            self.pos += 1;
            let hash = self.read_hash()?;
            return Ok(Ref::from_marker(hash, self.loader));
        }
        let cell = self.read_cell()?;
        if !cell.is_embedded() {
            return Err(Error::format(format!(
                "inline child with tag {:#04x} is not embeddable",
                cell.tag()
            )));
        }
        Ok(Ref::direct(cell).with_status(RefStatus::Embedded))
    }

    /// Read a tag and its payload
    pub fn read_cell(&mut self) -> Result<Arc<Cell>> {
        self.depth += 1;
        if self.depth > MAX_DECODE_DEPTH {
            return Err(Error::format("nesting exceeds decode depth limit"));
        }
        let value = self.read_value()?;
        self.depth -= 1;
        Ok(Arc::new(Cell::new(value)))
    }

    fn read_value(&mut self) -> Result<Value> {
        let t = self.read_byte()?;
        let value = match t {
            tag::NULL => Value::Nil,
            tag::FALSE => Value::Bool(false),
            tag::TRUE => Value::Bool(true),
            tag::INTEGER => Value::Integer(self.read_long()?),
            tag::DOUBLE => {
                let raw = self.read_bytes(8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(raw);
                let bits = u64::from_be_bytes(arr);
                let d = f64::from_bits(bits);
                if d.is_nan() && bits != CANONICAL_NAN_BITS {
                    return Err(Error::format("non-canonical NaN"));
                }
                Value::Double(d)
            }
            tag::STRING => {
                let raw = self.read_text(MAX_BLOB_LENGTH)?;
                Value::String(raw.to_string())
            }
            tag::BLOB => {
                let n = self.read_len(MAX_BLOB_LENGTH)?;
                Value::Blob(Bytes::copy_from_slice(self.read_bytes(n)?))
            }
            tag::SYMBOL | tag::KEYWORD => {
                let name = self.read_text(MAX_SYMBOL_LENGTH)?;
                if name.is_empty() {
                    return Err(Error::format("empty symbol name"));
                }
                let interned = crate::cell::intern(name);
                if t == tag::SYMBOL {
                    Value::Symbol(interned)
                } else {
                    Value::Keyword(interned)
                }
            }
            tag::VECTOR => Value::Vector(self.read_refs()?),
            tag::MAP => Value::Map(TrieNode::read(self, TrieKind::Map)?),
            tag::SET => Value::Set(TrieNode::read(self, TrieKind::Set)?),
            0xA0..=0xAF => Value::Record {
                kind: tag::low_nibble(t),
                fields: self.read_refs()?,
            },
            0xC0..=0xCF => Value::Code {
                opcode: tag::low_nibble(t),
                operands: self.read_refs()?,
            },
            0xE0..=0xEF => Value::Extension {
                kind: tag::low_nibble(t),
                value: self.read_count()?,
            },
            tag::REF => return Err(Error::format("ref tag where a value was expected")),
            other => return Err(Error::format(format!("unknown tag {:#04x}", other))),
        };
        Ok(value)
    }

    fn read_text(&mut self, max: usize) -> Result<&'a str> {
        let n = self.read_len(max)?;
        let raw = self.read_bytes(n)?;
        std::str::from_utf8(raw).map_err(|_| Error::format("invalid UTF-8"))
    }

    fn read_refs(&mut self) -> Result<Vec<Ref>> {
        let n = self.read_len(MAX_FIELDS)?;
        (0..n).map(|_| self.read_ref()).collect()
    }
}
