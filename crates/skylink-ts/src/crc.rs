//! CRC-32/MPEG-2: polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no
//! reflection, no final XOR.

const POLY: u32 = 0x04C1_1DB7;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-32/MPEG-2 of `data`.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
        let idx = ((crc >> 24) ^ byte as u32) & 0xFF;
        (crc << 8) ^ TABLE[idx as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitwise(data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in data {
            crc ^= (byte as u32) << 24;
            for _ in 0..8 {
                crc = if crc & 0x8000_0000 != 0 {
                    (crc << 1) ^ POLY
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc32_mpeg2(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_matches_bitwise_reference() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        assert_eq!(crc32_mpeg2(&data), bitwise(&data));
        assert_eq!(crc32_mpeg2(&data[..17]), bitwise(&data[..17]));
    }

    #[test]
    fn test_residue_is_zero_with_crc_appended() {
        let data = b"section bytes";
        let mut framed = data.to_vec();
        framed.extend_from_slice(&crc32_mpeg2(data).to_be_bytes());
        assert_eq!(crc32_mpeg2(&framed), 0);
    }
}
