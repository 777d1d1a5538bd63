//! ACK and MCAST control bytes of the time coordination and time correction sections

use crate::types::Anomaly;
use serde::{Deserialize, Serialize};

/// ACK byte sent by a consumer in a time coordination message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckByte {
    pub raw: u8,
    pub ping_count_reply: bool,
    pub ping_response: bool,
    pub parity_even: bool,
}

impl AckByte {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            raw: byte,
            ping_count_reply: (byte & 0x01) != 0,
            ping_response: (byte & 0x08) != 0,
            parity_even: (byte & 0x80) != 0,
        }
    }

    /// Parity bit makes the total number of set bits even
    #[must_use]
    pub fn parity_ok(&self) -> bool {
        self.raw.count_ones() % 2 == 0
    }

    /// Parity anomaly plus, for Base, the ACK byte 2 complement check
    #[must_use]
    pub fn anomalies(&self, ack_byte_2: Option<u8>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if !self.parity_ok() {
            anomalies.push(Anomaly::AckByteParity);
        }
        if let Some(second) = ack_byte_2 {
            if second != !self.raw {
                anomalies.push(Anomaly::AckByteNotComplemented);
            }
        }
        anomalies
    }
}

/// MCAST byte sent by a producer in a time correction message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McastByte {
    pub raw: u8,
    pub consumer_number: u8,
    /// Multicast active/idle
    pub mai: bool,
    pub parity_even: bool,
}

impl McastByte {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            raw: byte,
            consumer_number: byte & 0x0F,
            mai: (byte & 0x20) != 0,
            parity_even: (byte & 0x80) != 0,
        }
    }

    #[must_use]
    pub fn parity_ok(&self) -> bool {
        self.raw.count_ones() % 2 == 0
    }

    #[must_use]
    pub fn anomalies(&self, mcast_byte_2: Option<u8>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if !self.parity_ok() {
            anomalies.push(Anomaly::McastByteParity);
        }
        if let Some(second) = mcast_byte_2 {
            if second != !self.raw {
                anomalies.push(Anomaly::McastByteNotComplemented);
            }
        }
        anomalies
    }
}

/// Set bit 7 so the byte has even parity
#[must_use]
pub fn with_even_parity(byte: u8) -> u8 {
    let low = byte & 0x7F;
    if low.count_ones() % 2 == 0 {
        low
    } else {
        low | 0x80
    }
}
