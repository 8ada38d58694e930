//! Map and set values built on the radix trie

mod map;
mod set;

pub use map::RadixMap;
pub use set::RadixSet;
