//! Message encodings and the format resolver
//!
//! A payload is resolved into a [`MessageLayout`]: an ordered list of
//! sections, each with one [`MessageEncoding`] and a byte range.
//!
//! Producer messages (n = I/O data size):
//! ```text
//! Base short      data[n] mode s1 s2 | ts[2] s1_ts                    (n + 6)
//! Base long       data[n] mode s3[2] comp[n] s3c[2] | ts[2] s1_ts     (2n + 8)
//! Extended short  data[n] mode s5_0 s5_1 ts[2] s5_2                   (n + 6)
//! Extended long   data[n] mode s5_0 s5_1 comp[n] ts[2] s5_2           (2n + 6)
//! multicast       ... | time correction (6)
//! ```
//! Consumer messages are a single 6-byte time coordination section.

use crate::types::{ProtocolError, Role, SafetyFormat};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Size of time coordination, time correction and short-format overhead
pub const SECTION_SIZE: usize = 6;
/// Base time stamp section: timestamp(2) + CRC-S1(1)
pub const TIME_STAMP_SECTION_SIZE: usize = 3;
/// Largest I/O data section
pub const MAX_DATA_SIZE: usize = 250;

/// The nine CIP Safety section encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEncoding {
    Base1or2ByteData,
    Extended1or2ByteData,
    Base3to250ByteData,
    Extended3to250ByteData,
    BaseTimeStamp,
    BaseTimeCoordination,
    ExtendedTimeCoordination,
    BaseTimeCorrection,
    ExtendedTimeCorrection,
}

impl MessageEncoding {
    #[must_use]
    pub fn format(self) -> SafetyFormat {
        match self {
            MessageEncoding::Base1or2ByteData
            | MessageEncoding::Base3to250ByteData
            | MessageEncoding::BaseTimeStamp
            | MessageEncoding::BaseTimeCoordination
            | MessageEncoding::BaseTimeCorrection => SafetyFormat::Base,
            MessageEncoding::Extended1or2ByteData
            | MessageEncoding::Extended3to250ByteData
            | MessageEncoding::ExtendedTimeCoordination
            | MessageEncoding::ExtendedTimeCorrection => SafetyFormat::Extended,
        }
    }

    #[must_use]
    pub fn is_data(self) -> bool {
        matches!(
            self,
            MessageEncoding::Base1or2ByteData
                | MessageEncoding::Extended1or2ByteData
                | MessageEncoding::Base3to250ByteData
                | MessageEncoding::Extended3to250ByteData
        )
    }

    #[must_use]
    pub fn is_long(self) -> bool {
        matches!(
            self,
            MessageEncoding::Base3to250ByteData | MessageEncoding::Extended3to250ByteData
        )
    }

    pub(crate) fn data(format: SafetyFormat, long: bool) -> Self {
        match (format, long) {
            (SafetyFormat::Base, false) => MessageEncoding::Base1or2ByteData,
            (SafetyFormat::Base, true) => MessageEncoding::Base3to250ByteData,
            (SafetyFormat::Extended, false) => MessageEncoding::Extended1or2ByteData,
            (SafetyFormat::Extended, true) => MessageEncoding::Extended3to250ByteData,
        }
    }

    fn time_coordination(format: SafetyFormat) -> Self {
        match format {
            SafetyFormat::Base => MessageEncoding::BaseTimeCoordination,
            SafetyFormat::Extended => MessageEncoding::ExtendedTimeCoordination,
        }
    }

    fn time_correction(format: SafetyFormat) -> Self {
        match format {
            SafetyFormat::Base => MessageEncoding::BaseTimeCorrection,
            SafetyFormat::Extended => MessageEncoding::ExtendedTimeCorrection,
        }
    }
}

/// One section of a resolved message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLayout {
    pub encoding: MessageEncoding,
    pub range: Range<usize>,
}

/// Resolved wire layout of one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLayout {
    pub format: SafetyFormat,
    pub role: Role,
    pub multicast: bool,
    /// I/O data size, zero for consumer messages
    pub data_size: usize,
    pub sections: Vec<SectionLayout>,
}

impl MessageLayout {
    /// Pick the encodings for a payload of `length` bytes.
    ///
    /// Fails with [`ProtocolError::TooShort`] when the payload is shorter than
    /// the minimum for its role, and [`ProtocolError::Malformed`] when a long
    /// format payload has odd length.
    pub fn resolve(
        format: SafetyFormat,
        role: Role,
        multicast: bool,
        length: usize,
    ) -> Result<Self, ProtocolError> {
        match role {
            Role::Consumer => Self::resolve_consumer(format, length),
            Role::Producer => Self::resolve_producer(format, multicast, length),
        }
    }

    fn resolve_consumer(format: SafetyFormat, length: usize) -> Result<Self, ProtocolError> {
        if length < SECTION_SIZE {
            return Err(ProtocolError::TooShort {
                actual: length,
                required: SECTION_SIZE,
            });
        }
        if length > SECTION_SIZE {
            tracing::debug!(
                "Ignoring {} trailing bytes after time coordination",
                length - SECTION_SIZE
            );
        }
        Ok(Self {
            format,
            role: Role::Consumer,
            multicast: false,
            data_size: 0,
            sections: vec![SectionLayout {
                encoding: MessageEncoding::time_coordination(format),
                range: 0..SECTION_SIZE,
            }],
        })
    }

    fn resolve_producer(
        format: SafetyFormat,
        multicast: bool,
        length: usize,
    ) -> Result<Self, ProtocolError> {
        let base_length = if multicast {
            2 * SECTION_SIZE
        } else {
            SECTION_SIZE
        };
        if length < base_length {
            return Err(ProtocolError::TooShort {
                actual: length,
                required: base_length,
            });
        }

        let long = length - base_length > 2;
        let encoding = MessageEncoding::data(format, long);
        if long && length % 2 != 0 {
            return Err(ProtocolError::Malformed {
                encoding,
                reason: format!("odd payload length {length} for a 3 to 250 byte data section"),
            });
        }

        // Everything before the optional time correction section
        let body = if multicast {
            length - SECTION_SIZE
        } else {
            length
        };

        let mut sections = Vec::with_capacity(3);
        let data_size = match (format, long) {
            (SafetyFormat::Base, false) => {
                let n = body - SECTION_SIZE;
                sections.push(SectionLayout {
                    encoding,
                    range: 0..n + 3,
                });
                sections.push(SectionLayout {
                    encoding: MessageEncoding::BaseTimeStamp,
                    range: body - TIME_STAMP_SECTION_SIZE..body,
                });
                n
            }
            (SafetyFormat::Base, true) => {
                let n = (body - (SECTION_SIZE + 2)) / 2;
                sections.push(SectionLayout {
                    encoding,
                    range: 0..2 * n + 5,
                });
                sections.push(SectionLayout {
                    encoding: MessageEncoding::BaseTimeStamp,
                    range: body - TIME_STAMP_SECTION_SIZE..body,
                });
                n
            }
            (SafetyFormat::Extended, false) => {
                let n = body - SECTION_SIZE;
                sections.push(SectionLayout {
                    encoding,
                    range: 0..body,
                });
                n
            }
            (SafetyFormat::Extended, true) => {
                let n = (body - SECTION_SIZE) / 2;
                sections.push(SectionLayout {
                    encoding,
                    range: 0..body,
                });
                n
            }
        };

        if data_size > MAX_DATA_SIZE {
            return Err(ProtocolError::Malformed {
                encoding,
                reason: format!("data section of {data_size} bytes exceeds {MAX_DATA_SIZE}"),
            });
        }

        if multicast {
            sections.push(SectionLayout {
                encoding: MessageEncoding::time_correction(format),
                range: body..length,
            });
        }

        Ok(Self {
            format,
            role: Role::Producer,
            multicast,
            data_size,
            sections,
        })
    }

    /// Data or time coordination encoding of this message
    #[must_use]
    pub fn primary(&self) -> MessageEncoding {
        self.sections[0].encoding
    }

    /// Total number of payload bytes covered by the layout
    #[must_use]
    pub fn length(&self) -> usize {
        self.sections.last().map_or(0, |s| s.range.end)
    }

    /// Byte offset of the 16-bit producer time stamp, if the message carries one
    #[must_use]
    pub fn time_stamp_offset(&self) -> Option<usize> {
        let n = self.data_size;
        self.sections.iter().find_map(|section| match section.encoding {
            MessageEncoding::BaseTimeStamp => Some(section.range.start),
            MessageEncoding::Extended1or2ByteData => Some(n + 3),
            MessageEncoding::Extended3to250ByteData => Some(2 * n + 3),
            _ => None,
        })
    }

    /// Read the producer time stamp from a payload this layout was resolved for
    #[must_use]
    pub fn time_stamp(&self, payload: &[u8]) -> Option<u16> {
        let offset = self.time_stamp_offset()?;
        let bytes = payload.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}
