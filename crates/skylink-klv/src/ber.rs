use bytes::{BufMut, BytesMut};

use crate::error::{KlvError, Result};

/// Append a BER length to `dst`.
///
/// ```text
/// len < 128        -> len
/// len <= 0xFF      -> 0x81 LL
/// len <= 0xFFFF    -> 0x82 LL LL
/// otherwise        -> 0x84 LL LL LL LL
/// ```
pub fn encode_ber_length(len: usize, dst: &mut BytesMut) {
    if len < 0x80 {
        dst.put_u8(len as u8);
    } else if len <= 0xFF {
        dst.put_u8(0x81);
        dst.put_u8(len as u8);
    } else if len <= 0xFFFF {
        dst.put_u8(0x82);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(0x84);
        dst.put_u32(len as u32);
    }
}

/// Number of bytes `encode_ber_length` writes for `len`.
pub fn ber_length_size(len: usize) -> usize {
    match len {
        0..=0x7F => 1,
        0x80..=0xFF => 2,
        0x100..=0xFFFF => 3,
        _ => 5,
    }
}

/// Decode a BER length from the start of `src`.
///
/// Returns the decoded length and the number of bytes it occupied.
pub fn decode_ber_length(src: &[u8]) -> Result<(usize, usize)> {
    let first = *src.first().ok_or(KlvError::Truncated {
        needed: 1,
        available: 0,
    })?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 || count > 4 {
        return Err(KlvError::UnsupportedBerLength(first));
    }
    if src.len() < 1 + count {
        return Err(KlvError::Truncated {
            needed: 1 + count,
            available: src.len(),
        });
    }

    let len = src[1..=count]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((len, 1 + count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_ber_length(len, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_short_form() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7F]);
    }

    #[test]
    fn test_long_forms() {
        assert_eq!(encoded(128), vec![0x81, 0x80]);
        assert_eq!(encoded(255), vec![0x81, 0xFF]);
        assert_eq!(encoded(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encoded(65535), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(encoded(65536), vec![0x84, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_boundary_lengths_roundtrip() {
        for len in [127usize, 128, 255, 256, 65535, 65536] {
            let wire = encoded(len);
            assert_eq!(wire.len(), ber_length_size(len));
            assert_eq!(decode_ber_length(&wire).unwrap(), (len, wire.len()));
        }
    }

    #[test]
    fn test_decode_three_byte_form() {
        assert_eq!(
            decode_ber_length(&[0x83, 0x01, 0x00, 0x00]).unwrap(),
            (65536, 4)
        );
    }

    #[test]
    fn test_decode_rejects_indefinite_and_oversized_forms() {
        assert!(matches!(
            decode_ber_length(&[0x80]),
            Err(KlvError::UnsupportedBerLength(0x80))
        ));
        assert!(matches!(
            decode_ber_length(&[0x85, 0, 0, 0, 0, 1]),
            Err(KlvError::UnsupportedBerLength(0x85))
        ));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode_ber_length(&[]),
            Err(KlvError::Truncated { .. })
        ));
        assert!(matches!(
            decode_ber_length(&[0x82, 0x01]),
            Err(KlvError::Truncated {
                needed: 3,
                available: 2
            })
        ));
    }
}
