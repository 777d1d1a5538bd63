//! Mode byte decoding and redundancy checks
//!
//! ```text
//! bit 7      6     5    4            3          2        1..0
//!     RunIdle TBD2  TBD  NotRunIdle   TBD2Copy   NotTBD   PingCount
//! ```

use crate::types::Anomaly;
use serde::{Deserialize, Serialize};

/// Run/idle and TBD bits, covered by the data CRCs
pub const MODE_DATA_MASK: u8 = 0xE0;
/// Ping count and redundancy bits, covered by the Base time stamp CRC-S1
pub const MODE_TIME_STAMP_MASK: u8 = 0x1F;

const PING_COUNT: u8 = 0x03;
const NOT_TBD: u8 = 0x04;
const TBD2_COPY: u8 = 0x08;
const NOT_RUN_IDLE: u8 = 0x10;
const TBD: u8 = 0x20;
const TBD2: u8 = 0x40;
const RUN_IDLE: u8 = 0x80;

/// Decoded mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeByte {
    pub raw: u8,
    pub ping_count: u8,
    pub not_tbd: bool,
    pub tbd2_copy: bool,
    pub not_run_idle: bool,
    pub tbd: bool,
    pub tbd2: bool,
    /// true = run, false = idle
    pub run_idle: bool,
}

impl ModeByte {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            raw: byte,
            ping_count: byte & PING_COUNT,
            not_tbd: (byte & NOT_TBD) != 0,
            tbd2_copy: (byte & TBD2_COPY) != 0,
            not_run_idle: (byte & NOT_RUN_IDLE) != 0,
            tbd: (byte & TBD) != 0,
            tbd2: (byte & TBD2) != 0,
            run_idle: (byte & RUN_IDLE) != 0,
        }
    }

    /// Build a mode byte whose redundancy bits are all consistent
    #[must_use]
    pub fn consistent(run: bool, tbd: bool, tbd2: bool, ping_count: u8) -> Self {
        let mut byte = ping_count & PING_COUNT;
        if run {
            byte |= RUN_IDLE;
        } else {
            byte |= NOT_RUN_IDLE;
        }
        if tbd {
            byte |= TBD;
        } else {
            byte |= NOT_TBD;
        }
        if tbd2 {
            byte |= TBD2 | TBD2_COPY;
        }
        Self::from_byte(byte)
    }

    /// Redundancy violations, in bit order
    #[must_use]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if self.tbd == self.not_tbd {
            anomalies.push(Anomaly::TbdNotComplemented);
        }
        if self.tbd2 != self.tbd2_copy {
            anomalies.push(Anomaly::Tbd2NotCopied);
        }
        if self.run_idle == self.not_run_idle {
            anomalies.push(Anomaly::RunIdleNotComplemented);
        }
        anomalies
    }

    /// Bits hashed by CRC-S1/S3/S5 data chains
    #[must_use]
    pub fn data_bits(&self) -> u8 {
        self.raw & MODE_DATA_MASK
    }

    /// Bits hashed by CRC-S2 and the complement CRC-S3
    #[must_use]
    pub fn complement_data_bits(&self) -> u8 {
        !self.raw & MODE_DATA_MASK
    }

    /// Bits hashed by the Base time stamp CRC-S1
    #[must_use]
    pub fn time_stamp_bits(&self) -> u8 {
        self.raw & MODE_TIME_STAMP_MASK
    }
}
