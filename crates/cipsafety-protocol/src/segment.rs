//! Safety Network Segment carried in a Forward Open
//!
//! Segment data layout (after the segment header):
//! ```text
//! [Format: 1]                     0 = Base target, 1 = router, 2 = Extended target
//! [Safety Config CRC: 4 LE]
//! [Config Timestamp: 4 LE ms + 2 LE days]
//! [Time Correction EPI: 4 LE]
//! [Time Correction Net Params: 2 LE]
//! [TUNID: 10]                     SNN(6) + node address(4 LE)
//! [ONID: 10]
//! [Ping Interval EPI Multiplier: 2 LE]
//! [Time Coord Msg Min Multiplier: 2 LE]
//! [Network Time Expectation Multiplier: 2 LE]
//! [Timeout Multiplier: 1]
//! [Max Consumer Number: 1]
//! Extended only:
//! [Max Fault Number: 2 LE]
//! [Initial Timestamp: 2 LE]
//! [Initial Rollover: 2 LE]
//! ```

use crate::types::{Anomaly, ProtocolError, SafetyFormat, SentinelField};
use serde::{Deserialize, Serialize};

pub const BASE_SEGMENT_SIZE: usize = 45;
pub const EXTENDED_SEGMENT_SIZE: usize = 51;

const FORMAT_BASE_TARGET: u8 = 0x00;
const FORMAT_EXTENDED_TARGET: u8 = 0x02;

/// Target or originator unique network identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueNetworkId {
    /// Safety network number
    pub snn: [u8; 6],
    pub node_address: u32,
}

impl UniqueNetworkId {
    fn parse(bytes: &[u8]) -> Self {
        let mut snn = [0u8; 6];
        snn.copy_from_slice(&bytes[..6]);
        Self {
            snn,
            node_address: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        }
    }

    /// All-0xFF identifier used to cancel a propose/apply sequence
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        self.snn.iter().all(|&b| b == 0xFF) && self.node_address == u32::MAX
    }
}

/// Extended-format fields of the segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedParameters {
    pub max_fault_number: u16,
    pub initial_time_stamp: u16,
    pub initial_rollover: u16,
}

/// Decoded Safety Network Segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySegment {
    pub format: SafetyFormat,
    pub config_crc: u32,
    pub config_time_ms: u32,
    pub config_date: u16,
    pub time_correction_epi: u32,
    pub time_correction_net_params: u16,
    pub tunid: UniqueNetworkId,
    pub onid: UniqueNetworkId,
    pub ping_interval_epi_multiplier: u16,
    pub time_coord_msg_min_multiplier: u16,
    pub network_time_expectation_multiplier: u16,
    pub timeout_multiplier: u8,
    pub max_consumer_number: u8,
    pub extended: Option<ExtendedParameters>,
}

impl SafetySegment {
    /// Parse segment data starting at the format byte
    #[allow(clippy::missing_errors_doc)]
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let Some(&format_byte) = data.first() else {
            return Err(ProtocolError::TooShort {
                actual: 0,
                required: BASE_SEGMENT_SIZE,
            });
        };

        let (format, required) = match format_byte {
            FORMAT_BASE_TARGET => (SafetyFormat::Base, BASE_SEGMENT_SIZE),
            FORMAT_EXTENDED_TARGET => (SafetyFormat::Extended, EXTENDED_SEGMENT_SIZE),
            other => return Err(ProtocolError::UnsupportedSegmentFormat(other)),
        };
        if data.len() < required {
            return Err(ProtocolError::TooShort {
                actual: data.len(),
                required,
            });
        }

        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let extended = (format == SafetyFormat::Extended).then(|| ExtendedParameters {
            max_fault_number: u16_at(45),
            initial_time_stamp: u16_at(47),
            initial_rollover: u16_at(49),
        });

        Ok(Self {
            format,
            config_crc: u32_at(1),
            config_time_ms: u32_at(5),
            config_date: u16_at(9),
            time_correction_epi: u32_at(11),
            time_correction_net_params: u16_at(15),
            tunid: UniqueNetworkId::parse(&data[17..27]),
            onid: UniqueNetworkId::parse(&data[27..37]),
            ping_interval_epi_multiplier: u16_at(37),
            time_coord_msg_min_multiplier: u16_at(39),
            network_time_expectation_multiplier: u16_at(41),
            timeout_multiplier: data[43],
            max_consumer_number: data[44],
            extended,
        })
    }

    /// Informational notes: cancel sentinels in TUNID/ONID
    #[must_use]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if self.tunid.is_cancel() {
            anomalies.push(Anomaly::CancelSentinel {
                field: SentinelField::Tunid,
            });
        }
        if self.onid.is_cancel() {
            anomalies.push(Anomaly::CancelSentinel {
                field: SentinelField::Onid,
            });
        }
        anomalies
    }
}
