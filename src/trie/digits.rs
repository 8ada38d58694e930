//! Nibble addressing of byte keys
//!
//! Digit `i` of a key is the high nibble of byte `i / 2` when `i` is even
//! and the low nibble when `i` is odd.

use bytes::Bytes;

/// Hex digit `index` of `key`. `index` must be below `digit_count(key)`.
pub fn digit(key: &[u8], index: usize) -> u8 {
    let b = key[index / 2];
    if index % 2 == 0 {
        b >> 4
    } else {
        b & 0x0F
    }
}

pub fn digit_count(key: &[u8]) -> usize {
    key.len() * 2
}

/// Number of leading digits `a` and `b` share, capped at `limit`
pub fn common_digits(a: &[u8], b: &[u8], limit: usize) -> usize {
    let limit = limit.min(digit_count(a)).min(digit_count(b));
    let mut i = 0;
    while i + 2 <= limit && a[i / 2] == b[i / 2] {
        i += 2;
    }
    while i < limit && digit(a, i) == digit(b, i) {
        i += 1;
    }
    i
}

/// The first `depth` digits of `key` as bytes, with an odd trailing
/// nibble zeroed
pub fn prefix_bytes(key: &[u8], depth: usize) -> Bytes {
    let mut out = key[..depth.div_ceil(2)].to_vec();
    if depth % 2 == 1 {
        if let Some(last) = out.last_mut() {
            *last &= 0xF0;
        }
    }
    Bytes::from(out)
}

/// True if the first `depth` digits of `key` equal those of `prefix`
pub fn has_prefix(key: &[u8], prefix: &[u8], depth: usize) -> bool {
    digit_count(key) >= depth && common_digits(key, prefix, depth) == depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit() {
        let key = [0xAB, 0x3C];
        assert_eq!(digit(&key, 0), 0xA);
        assert_eq!(digit(&key, 1), 0xB);
        assert_eq!(digit(&key, 2), 0x3);
        assert_eq!(digit(&key, 3), 0xC);
    }

    #[test]
    fn test_common_digits() {
        assert_eq!(common_digits(&[0x12, 0x34], &[0x12, 0x35], usize::MAX), 3);
        assert_eq!(common_digits(&[0x12, 0x34], &[0x22], usize::MAX), 0);
        assert_eq!(common_digits(&[0x12], &[0x12, 0x34], usize::MAX), 2);
        assert_eq!(common_digits(&[0x12, 0x34], &[0x12, 0x34], 3), 3);
    }

    #[test]
    fn test_prefix_bytes() {
        assert_eq!(prefix_bytes(&[0x12, 0x34], 3).as_ref(), &[0x12, 0x30]);
        assert_eq!(prefix_bytes(&[0x12, 0x34], 2).as_ref(), &[0x12]);
        assert!(prefix_bytes(&[0x12], 0).is_empty());
    }

    #[test]
    fn test_has_prefix() {
        assert!(has_prefix(&[0x12, 0x34], &[0x12, 0x30], 3));
        assert!(!has_prefix(&[0x12, 0x44], &[0x12, 0x30], 3));
        assert!(!has_prefix(&[0x12], &[0x12, 0x30], 3));
    }
}
