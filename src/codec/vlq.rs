//! Variable-length quantities
//!
//! Each byte carries 7 data bits, most significant group first. The high
//! bit is set on every byte except the last. Counts are unsigned; longs
//! are two's complement with the sign taken from bit 6 of the first byte.
//!
//! Only minimal encodings are accepted: a decoded value must re-encode to
//! exactly the number of bytes consumed.

use crate::error::{Error, Result};

/// Upper bound on the bytes of a single VLQ (enough for 64 bits)
pub const MAX_VLQ_LENGTH: usize = 10;

const CONTINUE: u8 = 0x80;
const DATA: u8 = 0x7F;

/// Bytes needed to encode `value` as an unsigned count
pub fn count_length(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Bytes needed to encode `value` as a signed long
pub fn long_length(value: i64) -> usize {
    let magnitude_bits = if value < 0 {
        64 - (!value).leading_zeros() as usize
    } else {
        64 - value.leading_zeros() as usize
    };
    (magnitude_bits + 1).div_ceil(7).max(1)
}

pub fn write_count(out: &mut Vec<u8>, value: u64) {
    let n = count_length(value);
    for i in (0..n).rev() {
        let group = ((value >> (7 * i)) as u8) & DATA;
        out.push(if i > 0 { group | CONTINUE } else { group });
    }
}

pub fn write_long(out: &mut Vec<u8>, value: i64) {
    let n = long_length(value);
    for i in (0..n).rev() {
        let group = ((value >> (7 * i)) as u8) & DATA;
        out.push(if i > 0 { group | CONTINUE } else { group });
    }
}

/// Read an unsigned count, returning the value and the bytes consumed
pub fn read_count(input: &[u8]) -> Result<(u64, usize)> {
    let mut acc: u128 = 0;
    for i in 0..MAX_VLQ_LENGTH {
        let b = *input
            .get(i)
            .ok_or_else(|| Error::format("truncated VLQ count"))?;
        acc = (acc << 7) | u128::from(b & DATA);
        if b & CONTINUE == 0 {
            let used = i + 1;
            let value = u64::try_from(acc)
                .map_err(|_| Error::format("VLQ count overflows 64 bits"))?;
            if count_length(value) != used {
                return Err(Error::format("non-minimal VLQ count"));
            }
            return Ok((value, used));
        }
    }
    Err(Error::format(format!(
        "VLQ count longer than {} bytes",
        MAX_VLQ_LENGTH
    )))
}

/// Read a signed long, returning the value and the bytes consumed
pub fn read_long(input: &[u8]) -> Result<(i64, usize)> {
    let first = *input
        .first()
        .ok_or_else(|| Error::format("truncated VLQ long"))?;
    let mut acc: i128 = if first & 0x40 != 0 { -1 } else { 0 };
    for i in 0..MAX_VLQ_LENGTH {
        let b = *input
            .get(i)
            .ok_or_else(|| Error::format("truncated VLQ long"))?;
        acc = (acc << 7) | i128::from(b & DATA);
        if b & CONTINUE == 0 {
            let used = i + 1;
            let value =
                i64::try_from(acc).map_err(|_| Error::format("VLQ long overflows 64 bits"))?;
            if long_length(value) != used {
                return Err(Error::format("non-minimal VLQ long"));
            }
            return Ok((value, used));
        }
    }
    Err(Error::format(format!(
        "VLQ long longer than {} bytes",
        MAX_VLQ_LENGTH
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_bytes(v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_count(&mut out, v);
        out
    }

    fn long_bytes(v: i64) -> Vec<u8> {
        let mut out = Vec::new();
        write_long(&mut out, v);
        out
    }

    #[test]
    fn test_count_known_vectors() {
        assert_eq!(count_bytes(0), vec![0x00]);
        assert_eq!(count_bytes(127), vec![0x7F]);
        assert_eq!(count_bytes(128), vec![0x81, 0x00]);
        assert_eq!(count_bytes(300), vec![0x82, 0x2C]);
        assert_eq!(count_bytes(u64::MAX).len(), MAX_VLQ_LENGTH);
    }

    #[test]
    fn test_long_known_vectors() {
        assert_eq!(long_bytes(0), vec![0x00]);
        assert_eq!(long_bytes(63), vec![0x3F]);
        assert_eq!(long_bytes(64), vec![0x80, 0x40]);
        assert_eq!(long_bytes(-1), vec![0x7F]);
        assert_eq!(long_bytes(-64), vec![0x40]);
        assert_eq!(long_bytes(-65), vec![0xFF, 0x3F]);
        assert_eq!(long_bytes(i64::MIN).len(), MAX_VLQ_LENGTH);
        assert_eq!(long_bytes(i64::MAX).len(), MAX_VLQ_LENGTH);
    }

    #[test]
    fn test_extremes_roundtrip() {
        for v in [i64::MIN, i64::MIN + 1, -1_000_000, 0, 1_000_000, i64::MAX] {
            let bytes = long_bytes(v);
            assert_eq!(read_long(&bytes).unwrap(), (v, bytes.len()));
        }
        for v in [0u64, 1, 16_383, 16_384, u64::MAX] {
            let bytes = count_bytes(v);
            assert_eq!(read_count(&bytes).unwrap(), (v, bytes.len()));
        }
    }

    #[test]
    fn test_reads_stop_at_terminator() {
        let (v, used) = read_count(&[0x81, 0x00, 0xFF, 0xFF]).unwrap();
        assert_eq!((v, used), (128, 2));
    }

    #[test]
    fn test_rejects_non_minimal() {
        assert!(read_count(&[0x80, 0x05]).unwrap_err().is_format());
        // 0xFF 0x7F is a padded -1
        assert!(read_long(&[0xFF, 0x7F]).unwrap_err().is_format());
        assert!(read_long(&[0x80, 0x05]).unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_truncated_and_overlong() {
        assert!(read_count(&[]).is_err());
        assert!(read_count(&[0x81]).is_err());
        assert!(read_long(&[0xC1, 0x80]).is_err());
        let overlong = [0x81u8; 11];
        assert!(read_count(&overlong).unwrap_err().is_format());
        assert!(read_long(&overlong).unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_overflow() {
        // 10 bytes carrying 70 significant bits
        let mut bytes = vec![0xFFu8; 9];
        bytes.insert(0, 0xBF);
        bytes[9] = 0x7F;
        assert!(read_count(&bytes).unwrap_err().is_format());
    }
}
