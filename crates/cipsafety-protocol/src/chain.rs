//! Per-field CRC chains
//!
//! Each function starts from a PID seed and hashes the protected fields in
//! wire order. Reordering the fields changes the result without any other
//! visible error, so every chain lives here and nowhere else.

use crate::complement::complement;
use crate::crc::{crc_s1, crc_s2, crc_s3, crc_s5};
use crate::mode::ModeByte;

/// CRC-S1 of a 1 or 2 byte Base data section: mode bits, then data
#[must_use]
pub fn s1_data(pid: u8, mode: &ModeByte, data: &[u8]) -> u8 {
    let crc = crc_s1(pid, &[mode.data_bits()]);
    crc_s1(crc, data)
}

/// CRC-S2 of a 1 or 2 byte Base data section: complemented mode bits, then complemented data
#[must_use]
pub fn s2_data(pid: u8, mode: &ModeByte, data: &[u8]) -> u8 {
    let crc = crc_s2(pid, &[mode.complement_data_bits()]);
    crc_s2(crc, &complement(data))
}

/// CRC-S1 of a Base time stamp section: ping count bits, then time stamp
#[must_use]
pub fn s1_time_stamp(pid: u8, mode: &ModeByte, time_stamp: u16) -> u8 {
    let crc = crc_s1(pid, &[mode.time_stamp_bits()]);
    crc_s1(crc, &time_stamp.to_le_bytes())
}

/// Actual CRC-S3 of a 3 to 250 byte Base data section
#[must_use]
pub fn s3_data(pid: u16, mode: &ModeByte, data: &[u8]) -> u16 {
    let crc = crc_s3(pid, &[mode.data_bits()]);
    crc_s3(crc, data)
}

/// Complement CRC-S3 of a 3 to 250 byte Base data section, over the transmitted complement region
#[must_use]
pub fn s3_complement_data(pid: u16, mode: &ModeByte, complement_data: &[u8]) -> u16 {
    let crc = crc_s3(pid, &[mode.complement_data_bits()]);
    crc_s3(crc, complement_data)
}

/// CRC-S3 of a Base time coordination or time correction section
#[must_use]
pub fn s3_time(pid: u16, control: u8, time_value: u16) -> u16 {
    let crc = crc_s3(pid, &[control]);
    crc_s3(crc, &time_value.to_le_bytes())
}

/// CRC-S5 of an Extended data section: rollover, mode bits, time stamp, data
#[must_use]
pub fn s5_data(pid: u32, rollover: u16, mode: &ModeByte, time_stamp: u16, data: &[u8]) -> u32 {
    let crc = crc_s5(pid, &rollover.to_le_bytes());
    let crc = crc_s5(crc, &[mode.data_bits()]);
    let crc = crc_s5(crc, &time_stamp.to_le_bytes());
    crc_s5(crc, data)
}

/// CRC-S5 of an Extended time coordination or time correction section
#[must_use]
pub fn s5_time(pid: u32, control: u8, time_value: u16) -> u32 {
    let crc = crc_s5(pid, &[control]);
    crc_s5(crc, &time_value.to_le_bytes())
}
