//! Producer-side message construction
//!
//! Builds wire payloads with correct CRCs for a connection. Used to generate
//! reference traffic and to exercise the decoder.

use crate::chain;
use crate::complement::complement;
use crate::encoding::{MessageEncoding, MAX_DATA_SIZE};
use crate::mode::ModeByte;
use crate::triad::{ConnectionTriad, PidSeeds};
use crate::types::{ProtocolError, SafetyFormat};

/// Builds CIP Safety payloads for one connection
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder {
    format: SafetyFormat,
    seeds: PidSeeds,
    /// MCAST byte and time correction value appended to multicast data
    time_correction: Option<(u8, u16)>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new(format: SafetyFormat, triad: &ConnectionTriad) -> Self {
        Self {
            format,
            seeds: PidSeeds::new(triad),
            time_correction: None,
        }
    }

    /// Append a time correction section (multicast connections)
    #[must_use]
    pub fn with_time_correction(mut self, mcast: u8, time_correction: u16) -> Self {
        self.time_correction = Some((mcast, time_correction));
        self
    }

    /// Build a producer data message.
    ///
    /// `rollover` only affects Extended messages.
    #[allow(clippy::missing_errors_doc)]
    pub fn data(
        &self,
        data: &[u8],
        mode: ModeByte,
        time_stamp: u16,
        rollover: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        let long = data.len() > 2;
        if data.is_empty() || data.len() > MAX_DATA_SIZE {
            return Err(ProtocolError::Malformed {
                encoding: MessageEncoding::data(self.format, long),
                reason: format!("cannot build a data section of {} bytes", data.len()),
            });
        }

        let mut out = Vec::with_capacity(2 * data.len() + 14);
        let ts = time_stamp.to_le_bytes();

        match (self.format, long) {
            (SafetyFormat::Base, false) => {
                out.extend_from_slice(data);
                out.push(mode.raw);
                out.push(chain::s1_data(self.seeds.s1, &mode, data));
                out.push(chain::s2_data(self.seeds.s2, &mode, data));
                self.push_time_stamp(&mut out, &mode, time_stamp);
            }
            (SafetyFormat::Base, true) => {
                let comp = complement(data);
                out.extend_from_slice(data);
                out.push(mode.raw);
                out.extend_from_slice(&chain::s3_data(self.seeds.s3, &mode, data).to_le_bytes());
                out.extend_from_slice(&comp);
                out.extend_from_slice(
                    &chain::s3_complement_data(self.seeds.s3, &mode, &comp).to_le_bytes(),
                );
                self.push_time_stamp(&mut out, &mode, time_stamp);
            }
            (SafetyFormat::Extended, false) => {
                let crc = chain::s5_data(self.seeds.s5, rollover, &mode, time_stamp, data)
                    .to_le_bytes();
                out.extend_from_slice(data);
                out.push(mode.raw);
                out.extend_from_slice(&crc[..2]);
                out.extend_from_slice(&ts);
                out.push(crc[2]);
            }
            (SafetyFormat::Extended, true) => {
                let crc = chain::s5_data(self.seeds.s5, rollover, &mode, time_stamp, data)
                    .to_le_bytes();
                out.extend_from_slice(data);
                out.push(mode.raw);
                out.extend_from_slice(&crc[..2]);
                out.extend_from_slice(&complement(data));
                out.extend_from_slice(&ts);
                out.push(crc[2]);
            }
        }

        if let Some((mcast, value)) = self.time_correction {
            self.push_time_correction(&mut out, mcast, value);
        }
        Ok(out)
    }

    /// Build a consumer time coordination message
    #[must_use]
    pub fn time_coordination(&self, ack: u8, consumer_time: u16) -> Vec<u8> {
        let mut out = Vec::with_capacity(6);
        out.push(ack);
        out.extend_from_slice(&consumer_time.to_le_bytes());
        match self.format {
            SafetyFormat::Base => {
                out.push(!ack);
                out.extend_from_slice(
                    &chain::s3_time(self.seeds.s3, ack, consumer_time).to_le_bytes(),
                );
            }
            SafetyFormat::Extended => {
                let crc = chain::s5_time(self.seeds.s5, ack, consumer_time).to_le_bytes();
                out.extend_from_slice(&crc[..3]);
            }
        }
        out
    }

    fn push_time_stamp(&self, out: &mut Vec<u8>, mode: &ModeByte, time_stamp: u16) {
        out.extend_from_slice(&time_stamp.to_le_bytes());
        out.push(chain::s1_time_stamp(self.seeds.s1, mode, time_stamp));
    }

    fn push_time_correction(&self, out: &mut Vec<u8>, mcast: u8, value: u16) {
        out.push(mcast);
        match self.format {
            SafetyFormat::Base => {
                out.push(!mcast);
                out.extend_from_slice(&value.to_le_bytes());
                out.extend_from_slice(&chain::s3_time(self.seeds.s3, mcast, value).to_le_bytes());
            }
            SafetyFormat::Extended => {
                out.extend_from_slice(&value.to_le_bytes());
                let crc = chain::s5_time(self.seeds.s5, mcast, value).to_le_bytes();
                out.extend_from_slice(&crc[..3]);
            }
        }
    }
}
