//! Seeded CRC families used by the CIP Safety integrity layers
//!
//! Every family is a plain MSB-first CRC with no input/output reflection and
//! no final XOR. The functions take a seed and return the updated register so
//! that calls can be chained field by field:
//!
//! ```text
//! seed0 = PID seed
//! seed1 = crc(seed0, field_a)
//! seed2 = crc(seed1, field_b)
//! ```
//!
//! | Family | Width | Polynomial |
//! |--------|-------|------------|
//! | S1     | 8     | 0x37       |
//! | S2     | 8     | 0x3B       |
//! | S3     | 16    | 0x080F     |
//! | S5     | 24    | 0x5D6DCB   |

use serde::{Deserialize, Serialize};

/// CRC-S1 polynomial
pub const POLY_S1: u8 = 0x37;
/// CRC-S2 polynomial
pub const POLY_S2: u8 = 0x3B;
/// CRC-S3 polynomial
pub const POLY_S3: u16 = 0x080F;
/// CRC-S5 polynomial
pub const POLY_S5: u32 = 0x005D_6DCB;

/// CRC-S5 register mask; the three register bytes are what goes on the wire
pub const CRC_S5_MASK: u32 = 0x00FF_FFFF;

const fn crc8_table(poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn crc24_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut j = 0;
        while j < 8 {
            if crc & 0x0080_0000 != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc & CRC_S5_MASK;
        i += 1;
    }
    table
}

static TABLE_S1: [u8; 256] = crc8_table(POLY_S1);
static TABLE_S2: [u8; 256] = crc8_table(POLY_S2);
static TABLE_S3: [u16; 256] = crc16_table(POLY_S3);
static TABLE_S5: [u32; 256] = crc24_table(POLY_S5);

/// CRC family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcFamily {
    /// 8-bit, polynomial 0x37
    S1,
    /// 8-bit, polynomial 0x3B
    S2,
    /// 16-bit, polynomial 0x080F
    S3,
    /// 24-bit, polynomial 0x5D6DCB
    S5,
}

impl CrcFamily {
    /// Mask applied to a seed before it enters the register
    #[must_use]
    pub fn seed_mask(self) -> u32 {
        match self {
            CrcFamily::S1 | CrcFamily::S2 => 0xFF,
            CrcFamily::S3 => 0xFFFF,
            CrcFamily::S5 => CRC_S5_MASK,
        }
    }
}

/// CRC-S1 update
#[inline]
#[must_use]
pub fn crc_s1(seed: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(seed, |crc, &byte| TABLE_S1[usize::from(crc ^ byte)])
}

/// CRC-S2 update
#[inline]
#[must_use]
pub fn crc_s2(seed: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(seed, |crc, &byte| TABLE_S2[usize::from(crc ^ byte)])
}

/// CRC-S3 update
#[inline]
#[must_use]
pub fn crc_s3(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &byte| {
        let index = usize::from((crc >> 8) as u8 ^ byte);
        TABLE_S3[index] ^ (crc << 8)
    })
}

/// CRC-S5 update over the 24-bit register in the low bits of a `u32`
#[inline]
#[must_use]
pub fn crc_s5(seed: u32, data: &[u8]) -> u32 {
    data.iter().fold(seed & CRC_S5_MASK, |crc, &byte| {
        let index = usize::from((crc >> 16) as u8 ^ byte);
        (TABLE_S5[index] ^ (crc << 8)) & CRC_S5_MASK
    })
}

/// Family-generic update.
///
/// The seed is truncated to the family width and the result is always
/// returned widened to `u32`.
#[must_use]
pub fn crc_update(family: CrcFamily, seed: u32, data: &[u8]) -> u32 {
    let seed = seed & family.seed_mask();
    match family {
        CrcFamily::S1 => u32::from(crc_s1(seed as u8, data)),
        CrcFamily::S2 => u32::from(crc_s2(seed as u8, data)),
        CrcFamily::S3 => u32::from(crc_s3(seed as u16, data)),
        CrcFamily::S5 => crc_s5(seed, data),
    }
}

/// Reassemble the three transmitted CRC-S5 bytes (little-endian order)
#[must_use]
pub fn reassemble_crc_s5(b0: u8, b1: u8, b2: u8) -> u32 {
    u32::from(b0) | (u32::from(b1) << 8) | (u32::from(b2) << 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bitwise reference implementation used to cross-check the tables
    fn crc8_bitwise(poly: u8, seed: u8, data: &[u8]) -> u8 {
        let mut crc = seed;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            }
        }
        crc
    }

    fn crc16_bitwise(poly: u16, seed: u16, data: &[u8]) -> u16 {
        let mut crc = seed;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            }
        }
        crc
    }

    fn crc24_bitwise(poly: u32, seed: u32, data: &[u8]) -> u32 {
        let mut crc = seed & 0x00FF_FFFF;
        for &byte in data {
            crc ^= u32::from(byte) << 16;
            for _ in 0..8 {
                crc = if crc & 0x0080_0000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
                crc &= 0x00FF_FFFF;
            }
        }
        crc
    }

    #[test]
    fn test_tables_match_bitwise() {
        let data = b"123456789";
        for seed in [0x00u8, 0x5A, 0xFF] {
            assert_eq!(crc_s1(seed, data), crc8_bitwise(POLY_S1, seed, data));
            assert_eq!(crc_s2(seed, data), crc8_bitwise(POLY_S2, seed, data));
        }
        for seed in [0x0000u16, 0x1234, 0xFFFF] {
            assert_eq!(crc_s3(seed, data), crc16_bitwise(POLY_S3, seed, data));
        }
        for seed in [0u32, 0x00AB_CDEF, 0x00FF_FFFF] {
            assert_eq!(crc_s5(seed, data), crc24_bitwise(POLY_S5, seed, data));
        }
    }

    #[test]
    fn test_check_values() {
        let data = b"123456789";
        assert_eq!(crc_s1(0, data), 0x2F);
        assert_eq!(crc_s2(0, data), 0xFD);
        assert_eq!(crc_s3(0, data), 0xC952);
        assert_eq!(crc_s5(0, data), 0x00B0_C390);
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(TABLE_S1[0], 0x00);
        assert_eq!(TABLE_S1[1], POLY_S1);
        assert_eq!(TABLE_S2[1], POLY_S2);
        assert_eq!(TABLE_S3[1], POLY_S3);
        assert_eq!(TABLE_S5[1], POLY_S5);
        assert!(TABLE_S5.iter().all(|&entry| entry <= CRC_S5_MASK));
        // 0x80 shifts out immediately: 0x80 << 1 = 0x00, xor poly
        assert_eq!(TABLE_S1[0x80], crc8_bitwise(POLY_S1, 0, &[0x80]));
    }

    #[test]
    fn test_s5_register_stays_24_bit() {
        let data = [0xFF; 16];
        assert!(crc_s5(0x00FF_FFFF, &data) <= CRC_S5_MASK);
        // Bits above the register are ignored
        assert_eq!(crc_s5(0xFF12_3456, &data), crc_s5(0x0012_3456, &data));
        assert_eq!(crc_update(CrcFamily::S5, 0xAB00_0001, &[]), 0x0000_0001);
    }

    #[test]
    fn test_empty_slice_returns_seed() {
        assert_eq!(crc_s1(0xA7, &[]), 0xA7);
        assert_eq!(crc_s3(0xBEEF, &[]), 0xBEEF);
        assert_eq!(crc_update(CrcFamily::S5, 0x0012_3456, &[]), 0x0012_3456);
    }

    #[test]
    fn test_chain_equals_concatenation() {
        let a = [0x01, 0x02, 0x03];
        let b = [0xF0, 0x0F];
        let joined = [0x01, 0x02, 0x03, 0xF0, 0x0F];
        for family in [CrcFamily::S1, CrcFamily::S2, CrcFamily::S3, CrcFamily::S5] {
            let chained = crc_update(family, crc_update(family, 0x42, &a), &b);
            assert_eq!(chained, crc_update(family, 0x42, &joined), "{family:?}");
        }
    }

    #[test]
    fn test_chain_order_matters() {
        let ab = crc_s3(crc_s3(0, &[0x11]), &[0x22]);
        let ba = crc_s3(crc_s3(0, &[0x22]), &[0x11]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_generic_truncates_seed() {
        assert_eq!(
            crc_update(CrcFamily::S1, 0x1FF, &[0x10]),
            u32::from(crc_s1(0xFF, &[0x10]))
        );
    }

    #[test]
    fn test_reassemble_crc_s5() {
        assert_eq!(reassemble_crc_s5(0x12, 0x34, 0x56), 0x0056_3412);
    }
}
