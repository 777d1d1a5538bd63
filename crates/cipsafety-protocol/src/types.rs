//! Common types used throughout the protocol

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::encoding::MessageEncoding;

/// Protocol errors
///
/// These are the hard failures: the message cannot be decoded and the caller
/// should show it as raw bytes. Integrity problems are reported as
/// [`Anomaly`] values instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed {encoding:?} message: {reason}")]
    Malformed {
        encoding: MessageEncoding,
        reason: String,
    },

    #[error("Payload too short: {actual} bytes, need at least {required}")]
    TooShort { actual: usize, required: usize },

    #[error("Message direction does not match the connection producer or consumer")]
    Unresolved,

    #[error("Unsupported safety segment format: {0:#04X}")]
    UnsupportedSegmentFormat(u8),
}

/// Top-level CIP Safety message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyFormat {
    Base,
    Extended,
}

impl fmt::Display for SafetyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyFormat::Base => write!(f, "Base"),
            SafetyFormat::Extended => write!(f, "Extended"),
        }
    }
}

/// Transport direction of a message relative to the connection originator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportDirection {
    /// O->T
    OriginatorToTarget,
    /// T->O
    TargetToOriginator,
}

impl TransportDirection {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            TransportDirection::OriginatorToTarget => TransportDirection::TargetToOriginator,
            TransportDirection::TargetToOriginator => TransportDirection::OriginatorToTarget,
        }
    }
}

impl fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportDirection::OriginatorToTarget => write!(f, "O->T"),
            TransportDirection::TargetToOriginator => write!(f, "T->O"),
        }
    }
}

/// Role of the sender of a message on a safety connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends safety I/O data
    Producer,
    /// Receives data and answers with time coordination messages
    Consumer,
}

impl Role {
    /// Resolve the role of a message from the connection's producing direction.
    ///
    /// Returns `None` when the producing direction is unknown.
    #[must_use]
    pub fn resolve(
        producer_direction: Option<TransportDirection>,
        observed: TransportDirection,
    ) -> Option<Self> {
        let producer = producer_direction?;
        if producer == observed {
            Some(Role::Producer)
        } else {
            Some(Role::Consumer)
        }
    }
}

/// Which integrity field a CRC result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcKind {
    /// CRC-S1 over mode byte and short data
    S1,
    /// CRC-S2 over complemented mode byte and data
    S2,
    /// CRC-S1 over ping count bits and time stamp
    S1TimeStamp,
    /// CRC-S3 over mode byte and long data
    S3,
    /// CRC-S3 over complemented mode byte and complement data
    S3Complement,
    /// CRC-S3 over ACK/MCAST byte and a time value
    S3Time,
    /// CRC-S5 over rollover, mode byte, time stamp and data
    S5,
    /// CRC-S5 over ACK/MCAST byte and a time value
    S5Time,
}

/// Verification outcome of one transmitted CRC field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrcStatus {
    Good,
    Bad { expected: u32 },
    /// No connection context, nothing was computed
    Unverified,
}

impl CrcStatus {
    /// Compare a received value against a computed one
    #[must_use]
    pub fn check(received: u32, computed: u32) -> Self {
        if received == computed {
            CrcStatus::Good
        } else {
            CrcStatus::Bad { expected: computed }
        }
    }

    #[must_use]
    pub fn is_bad(&self) -> bool {
        matches!(self, CrcStatus::Bad { .. })
    }
}

/// A transmitted CRC field and its verification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrcField {
    pub kind: CrcKind,
    /// Raw value as received on the wire
    pub received: u32,
    pub status: CrcStatus,
}

/// Integrity anomalies. None of these stop decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anomaly", rename_all = "snake_case")]
pub enum Anomaly {
    TbdNotComplemented,
    Tbd2NotCopied,
    RunIdleNotComplemented,
    DataNotComplemented,
    CrcMismatch {
        kind: CrcKind,
        expected: u32,
        received: u32,
    },
    AckByteNotComplemented,
    AckByteParity,
    McastByteNotComplemented,
    McastByteParity,
    /// All-0xFF identifier, informational only
    CancelSentinel { field: SentinelField },
}

/// Fields that may carry the all-0xFF cancel sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelField {
    Tunid,
    Onid,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::TbdNotComplemented => write!(f, "TBD bit not complemented"),
            Anomaly::Tbd2NotCopied => write!(f, "TBD2 bit not copied"),
            Anomaly::RunIdleNotComplemented => write!(f, "Run/Idle bit not complemented"),
            Anomaly::DataNotComplemented => write!(f, "Complement data not complemented"),
            Anomaly::CrcMismatch {
                kind,
                expected,
                received,
            } => write!(
                f,
                "{kind:?} CRC mismatch: expected {expected:#X}, received {received:#X}"
            ),
            Anomaly::AckByteNotComplemented => write!(f, "ACK byte 2 not complemented"),
            Anomaly::AckByteParity => write!(f, "ACK byte parity error"),
            Anomaly::McastByteNotComplemented => write!(f, "MCAST byte 2 not complemented"),
            Anomaly::McastByteParity => write!(f, "MCAST byte parity error"),
            Anomaly::CancelSentinel { field } => write!(f, "{field:?} carries the cancel value"),
        }
    }
}
