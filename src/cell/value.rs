//! The closed set of value variants a cell can hold

use crate::codec::{self, tag, write_blob, write_count, write_long};
use crate::refs::Ref;
use crate::trie::TrieNode;
use bytes::Bytes;
use std::sync::Arc;

use super::{Encodable, RefContainer};

/// Payload of a [`Cell`](super::Cell)
///
/// Variants are only reachable through the validating constructors on
/// `Cell` or through the decoder, so the length and range limits of the
/// wire format hold for every instance.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    /// Always finite or the canonical NaN
    Double(f64),
    String(String),
    Blob(Bytes),
    Symbol(Arc<str>),
    Keyword(Arc<str>),
    Vector(Vec<Ref>),
    Record { kind: u8, fields: Vec<Ref> },
    Code { opcode: u8, operands: Vec<Ref> },
    Extension { kind: u8, value: u64 },
    Map(TrieNode),
    Set(TrieNode),
}

impl Value {
    /// Leading tag byte of this value's encoding
    pub fn tag(&self) -> u8 {
        match self {
            Value::Nil => tag::NULL,
            Value::Bool(false) => tag::FALSE,
            Value::Bool(true) => tag::TRUE,
            Value::Integer(_) => tag::INTEGER,
            Value::Double(_) => tag::DOUBLE,
            Value::String(_) => tag::STRING,
            Value::Blob(_) => tag::BLOB,
            Value::Symbol(_) => tag::SYMBOL,
            Value::Keyword(_) => tag::KEYWORD,
            Value::Vector(_) => tag::VECTOR,
            Value::Record { kind, .. } => tag::RECORD_BASE | kind,
            Value::Code { opcode, .. } => tag::CODE_BASE | opcode,
            Value::Extension { kind, .. } => tag::EXTENSION_BASE | kind,
            Value::Map(_) => tag::MAP,
            Value::Set(_) => tag::SET,
        }
    }

    /// Human-readable variant name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Vector(_) => "vector",
            Value::Record { .. } => "record",
            Value::Code { .. } => "code",
            Value::Extension { .. } => "extension",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }
}

impl Encodable for Value {
    fn write_encoding(&self, out: &mut Vec<u8>) {
        match self {
            Value::Map(node) | Value::Set(node) => node.write_encoding(out),
            _ => {
                out.push(self.tag());
                match self {
                    Value::Integer(i) => write_long(out, *i),
                    Value::Double(d) => out.extend_from_slice(&d.to_bits().to_be_bytes()),
                    Value::String(s) => write_blob(out, s.as_bytes()),
                    Value::Blob(b) => write_blob(out, b),
                    Value::Symbol(s) | Value::Keyword(s) => write_blob(out, s.as_bytes()),
                    Value::Vector(refs)
                    | Value::Record { fields: refs, .. }
                    | Value::Code {
                        operands: refs, ..
                    } => {
                        write_count(out, refs.len() as u64);
                        for r in refs {
                            codec::write_ref(out, r);
                        }
                    }
                    Value::Extension { value, .. } => write_count(out, *value),
                    _ => {}
                }
            }
        }
    }
}

impl RefContainer for Value {
    fn child_refs(&self) -> Vec<&Ref> {
        match self {
            Value::Vector(refs)
            | Value::Record { fields: refs, .. }
            | Value::Code {
                operands: refs, ..
            } => refs.iter().collect(),
            Value::Map(node) | Value::Set(node) => node.child_refs(),
            _ => Vec::new(),
        }
    }
}
