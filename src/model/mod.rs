//! Identity types shared by every layer

mod hash;

pub use hash::{Hash, HASH_LENGTH};
