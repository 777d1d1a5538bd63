//! Connection triad and PID seed derivation

use crate::crc::{crc_s1, crc_s2, crc_s3, crc_s5, crc_update, CrcFamily};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized triad size: vendor(2) + device serial(4) + connection serial(2)
pub const TRIAD_SIZE: usize = 8;

/// Identifies one CIP Safety connection instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTriad {
    pub vendor_id: u16,
    pub device_serial_number: u32,
    pub connection_serial_number: u16,
}

impl ConnectionTriad {
    #[must_use]
    pub fn new(vendor_id: u16, device_serial_number: u32, connection_serial_number: u16) -> Self {
        Self {
            vendor_id,
            device_serial_number,
            connection_serial_number,
        }
    }

    /// Little-endian wire form hashed into the PID seed
    #[must_use]
    pub fn to_bytes(&self) -> [u8; TRIAD_SIZE] {
        let mut buf = [0u8; TRIAD_SIZE];
        buf[0..2].copy_from_slice(&self.vendor_id.to_le_bytes());
        buf[2..6].copy_from_slice(&self.device_serial_number.to_le_bytes());
        buf[6..8].copy_from_slice(&self.connection_serial_number.to_le_bytes());
        buf
    }
}

impl fmt::Display for ConnectionTriad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#06x}/{:#010x}/{:#06x}",
            self.vendor_id, self.device_serial_number, self.connection_serial_number
        )
    }
}

/// PID seed for one CRC family
#[must_use]
pub fn triad_seed(family: CrcFamily, triad: &ConnectionTriad) -> u32 {
    crc_update(family, 0, &triad.to_bytes())
}

/// PID seeds for all four families, computed once per message
///
/// `s5` holds the 24-bit CRC-S5 register in its low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidSeeds {
    pub s1: u8,
    pub s2: u8,
    pub s3: u16,
    pub s5: u32,
}

impl PidSeeds {
    #[must_use]
    pub fn new(triad: &ConnectionTriad) -> Self {
        let buf = triad.to_bytes();
        Self {
            s1: crc_s1(0, &buf),
            s2: crc_s2(0, &buf),
            s3: crc_s3(0, &buf),
            s5: crc_s5(0, &buf),
        }
    }
}
