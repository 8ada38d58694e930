//! Tag registry
//!
//! Tag assignments are append-only: once a tag is in use on the wire it is
//! never renumbered or reused for another shape.

pub const NULL: u8 = 0x00;

pub const INTEGER: u8 = 0x10;
pub const DOUBLE: u8 = 0x1D;

/// Marks a non-embedded child: followed by a 32-byte hash
pub const REF: u8 = 0x20;

pub const STRING: u8 = 0x30;
pub const BLOB: u8 = 0x31;
pub const SYMBOL: u8 = 0x32;
pub const KEYWORD: u8 = 0x33;

pub const VECTOR: u8 = 0x80;
pub const SET: u8 = 0x83;
pub const MAP: u8 = 0x84;

/// Records occupy `0xA0..=0xAF`; the low nibble is the record kind
pub const RECORD_BASE: u8 = 0xA0;

pub const FALSE: u8 = 0xB0;
pub const TRUE: u8 = 0xB1;

/// Code cells occupy `0xC0..=0xCF`; the low nibble is the opcode
pub const CODE_BASE: u8 = 0xC0;

/// Extension values occupy `0xE0..=0xEF`; the low nibble is the kind
pub const EXTENSION_BASE: u8 = 0xE0;

/// Coarse grouping of the tag space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Null,
    Numeric,
    Ref,
    Text,
    Blob,
    Collection,
    Record,
    Boolean,
    Code,
    Extension,
}

/// Classify a tag byte, or `None` if it is not registered
pub fn category(tag: u8) -> Option<Category> {
    match tag {
        NULL => Some(Category::Null),
        INTEGER | DOUBLE => Some(Category::Numeric),
        REF => Some(Category::Ref),
        STRING | SYMBOL | KEYWORD => Some(Category::Text),
        BLOB => Some(Category::Blob),
        VECTOR | SET | MAP => Some(Category::Collection),
        0xA0..=0xAF => Some(Category::Record),
        FALSE | TRUE => Some(Category::Boolean),
        0xC0..=0xCF => Some(Category::Code),
        0xE0..=0xEF => Some(Category::Extension),
        _ => None,
    }
}

/// Low nibble of a ranged tag (record kind, opcode, extension kind)
pub fn low_nibble(tag: u8) -> u8 {
    tag & 0x0F
}
