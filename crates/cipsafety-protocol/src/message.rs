//! CIP Safety message decoding and verification
//!
//! [`SafetyMessage::decode`] resolves the layout of a payload, then walks its
//! sections in wire order. Mode byte, complement data and CRC problems are
//! collected as [`Anomaly`] values; only layout failures are errors.

use crate::chain;
use crate::complement::complement_check;
use crate::control::{AckByte, McastByte};
use crate::crc::reassemble_crc_s5;
use crate::encoding::{MessageEncoding, MessageLayout, SectionLayout};
use crate::mode::ModeByte;
use crate::triad::{ConnectionTriad, PidSeeds};
use crate::types::{Anomaly, CrcField, CrcKind, CrcStatus, ProtocolError, Role, SafetyFormat};
use serde::{Deserialize, Serialize};

/// Connection metadata supplied with every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionContext {
    pub format: SafetyFormat,
    /// `None` when the message direction matches neither producer nor consumer
    pub role: Option<Role>,
    pub multicast: bool,
    /// False when no Forward Open was seen for this connection
    pub compute_crc: bool,
    pub triad: ConnectionTriad,
}

impl ConnectionContext {
    /// Resolve the wire layout for a payload of `length` bytes
    pub fn layout(&self, length: usize) -> Result<MessageLayout, ProtocolError> {
        let role = self.role.ok_or(ProtocolError::Unresolved)?;
        MessageLayout::resolve(self.format, role, self.multicast, length)
    }
}

/// I/O data section (all four data encodings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSection {
    pub encoding: MessageEncoding,
    pub data: Vec<u8>,
    pub mode: ModeByte,
    /// Transmitted complement copy (3 to 250 byte formats)
    pub complement_data: Option<Vec<u8>>,
    /// Result of the complement check (3 to 250 byte formats)
    pub complement_ok: Option<bool>,
    /// Time stamp embedded in Extended data sections
    pub time_stamp: Option<u16>,
    /// Rollover value folded into CRC-S5
    pub rollover: Option<u16>,
    pub crcs: Vec<CrcField>,
}

/// Base time stamp section following a Base data section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStampSection {
    pub time_stamp: u16,
    pub crc: CrcField,
}

/// Consumer time coordination section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCoordinationSection {
    pub encoding: MessageEncoding,
    pub ack: AckByte,
    /// Base only
    pub ack_byte_2: Option<u8>,
    pub consumer_time: u16,
    pub crc: CrcField,
}

/// Multicast time correction section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCorrectionSection {
    pub encoding: MessageEncoding,
    pub mcast: McastByte,
    /// Base only
    pub mcast_byte_2: Option<u8>,
    pub time_correction: u16,
    pub crc: CrcField,
}

/// Decoded section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum Section {
    Data(DataSection),
    TimeStamp(TimeStampSection),
    TimeCoordination(TimeCoordinationSection),
    TimeCorrection(TimeCorrectionSection),
}

impl Section {
    fn crcs(&self) -> &[CrcField] {
        match self {
            Section::Data(d) => &d.crcs,
            Section::TimeStamp(t) => std::slice::from_ref(&t.crc),
            Section::TimeCoordination(t) => std::slice::from_ref(&t.crc),
            Section::TimeCorrection(t) => std::slice::from_ref(&t.crc),
        }
    }
}

/// A fully decoded CIP Safety message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyMessage {
    pub layout: MessageLayout,
    pub sections: Vec<Section>,
    pub anomalies: Vec<Anomaly>,
}

impl SafetyMessage {
    /// Decode one payload.
    ///
    /// `rollover` is the frozen rollover annotation of this message. Extended
    /// data sections report CRC-S5 as unverified without it.
    #[allow(clippy::missing_errors_doc)]
    pub fn decode(
        payload: &[u8],
        context: &ConnectionContext,
        rollover: Option<u16>,
    ) -> Result<Self, ProtocolError> {
        let layout = context.layout(payload.len())?;
        Self::decode_with_layout(payload, layout, context, rollover)
    }

    /// Decode with a layout resolved earlier by [`ConnectionContext::layout`]
    #[allow(clippy::missing_errors_doc)]
    pub fn decode_with_layout(
        payload: &[u8],
        layout: MessageLayout,
        context: &ConnectionContext,
        rollover: Option<u16>,
    ) -> Result<Self, ProtocolError> {
        if payload.len() < layout.length() {
            return Err(ProtocolError::TooShort {
                actual: payload.len(),
                required: layout.length(),
            });
        }

        let mut decoder = Decoder {
            seeds: context.compute_crc.then(|| PidSeeds::new(&context.triad)),
            data_size: layout.data_size,
            rollover,
            mode: None,
            anomalies: Vec::new(),
        };

        let sections: Vec<Section> = layout
            .sections
            .iter()
            .map(|section| decoder.section(payload, section))
            .collect();

        tracing::debug!(
            "Decoded {:?} message ({} bytes, {} anomalies)",
            layout.primary(),
            payload.len(),
            decoder.anomalies.len()
        );

        Ok(Self {
            layout,
            sections,
            anomalies: decoder.anomalies,
        })
    }

    /// The I/O data section, for producer messages
    #[must_use]
    pub fn data_section(&self) -> Option<&DataSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Data(d) => Some(d),
            _ => None,
        })
    }

    #[must_use]
    pub fn time_coordination(&self) -> Option<&TimeCoordinationSection> {
        self.sections.iter().find_map(|s| match s {
            Section::TimeCoordination(t) => Some(t),
            _ => None,
        })
    }

    #[must_use]
    pub fn time_correction(&self) -> Option<&TimeCorrectionSection> {
        self.sections.iter().find_map(|s| match s {
            Section::TimeCorrection(t) => Some(t),
            _ => None,
        })
    }

    /// Producer time stamp, wherever the format carries it
    #[must_use]
    pub fn time_stamp(&self) -> Option<u16> {
        self.sections.iter().find_map(|s| match s {
            Section::Data(d) => d.time_stamp,
            Section::TimeStamp(t) => Some(t.time_stamp),
            _ => None,
        })
    }

    /// All CRC fields in wire order
    pub fn crcs(&self) -> impl Iterator<Item = &CrcField> {
        self.sections.iter().flat_map(Section::crcs)
    }

    /// First CRC field of the given kind
    #[must_use]
    pub fn crc(&self, kind: CrcKind) -> Option<&CrcField> {
        self.crcs().find(|c| c.kind == kind)
    }

    /// True when every CRC was computed and matched and nothing else was flagged
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.anomalies.is_empty() && self.crcs().all(|c| c.status == CrcStatus::Good)
    }
}

/// Per-message decoding state
struct Decoder {
    seeds: Option<PidSeeds>,
    data_size: usize,
    rollover: Option<u16>,
    /// Set by the data section, read by the Base time stamp section
    mode: Option<ModeByte>,
    anomalies: Vec<Anomaly>,
}

impl Decoder {
    fn section(&mut self, payload: &[u8], layout: &SectionLayout) -> Section {
        let bytes = &payload[layout.range.clone()];
        match layout.encoding {
            MessageEncoding::Base1or2ByteData => self.base_short_data(bytes),
            MessageEncoding::Base3to250ByteData => self.base_long_data(bytes),
            MessageEncoding::Extended1or2ByteData => self.extended_short_data(bytes),
            MessageEncoding::Extended3to250ByteData => self.extended_long_data(bytes),
            MessageEncoding::BaseTimeStamp => self.base_time_stamp(bytes),
            MessageEncoding::BaseTimeCoordination => self.base_time_coordination(bytes),
            MessageEncoding::ExtendedTimeCoordination => self.extended_time_coordination(bytes),
            MessageEncoding::BaseTimeCorrection => self.base_time_correction(bytes),
            MessageEncoding::ExtendedTimeCorrection => self.extended_time_correction(bytes),
        }
    }

    /// Compare a received CRC with a computed one and record a mismatch
    fn verify(&mut self, kind: CrcKind, received: u32, computed: Option<u32>) -> CrcField {
        let status = computed.map_or(CrcStatus::Unverified, |c| CrcStatus::check(received, c));
        if let CrcStatus::Bad { expected } = status {
            tracing::debug!(
                "{:?} mismatch: received {:#X}, expected {:#X}",
                kind,
                received,
                expected
            );
            self.anomalies.push(Anomaly::CrcMismatch {
                kind,
                expected,
                received,
            });
        }
        CrcField {
            kind,
            received,
            status,
        }
    }

    fn mode_byte(&mut self, byte: u8) -> ModeByte {
        let mode = ModeByte::from_byte(byte);
        self.anomalies.extend(mode.anomalies());
        self.mode = Some(mode);
        mode
    }

    fn check_complement(&mut self, data: &[u8], complement: &[u8]) -> bool {
        let ok = complement_check(data, complement);
        if !ok {
            self.anomalies.push(Anomaly::DataNotComplemented);
        }
        ok
    }

    fn base_short_data(&mut self, bytes: &[u8]) -> Section {
        let n = self.data_size;
        let data = &bytes[..n];
        let mode = self.mode_byte(bytes[n]);

        let s1 = self.seeds.map(|s| u32::from(chain::s1_data(s.s1, &mode, data)));
        let s2 = self.seeds.map(|s| u32::from(chain::s2_data(s.s2, &mode, data)));
        let crcs = vec![
            self.verify(CrcKind::S1, u32::from(bytes[n + 1]), s1),
            self.verify(CrcKind::S2, u32::from(bytes[n + 2]), s2),
        ];

        Section::Data(DataSection {
            encoding: MessageEncoding::Base1or2ByteData,
            data: data.to_vec(),
            mode,
            complement_data: None,
            complement_ok: None,
            time_stamp: None,
            rollover: None,
            crcs,
        })
    }

    fn base_long_data(&mut self, bytes: &[u8]) -> Section {
        let n = self.data_size;
        let data = &bytes[..n];
        let mode = self.mode_byte(bytes[n]);
        let actual_crc = u16::from_le_bytes([bytes[n + 1], bytes[n + 2]]);
        let complement = &bytes[n + 3..2 * n + 3];
        let complement_crc = u16::from_le_bytes([bytes[2 * n + 3], bytes[2 * n + 4]]);

        let complement_ok = self.check_complement(data, complement);

        let s3 = self.seeds.map(|s| u32::from(chain::s3_data(s.s3, &mode, data)));
        let s3c = self
            .seeds
            .map(|s| u32::from(chain::s3_complement_data(s.s3, &mode, complement)));
        let crcs = vec![
            self.verify(CrcKind::S3, u32::from(actual_crc), s3),
            self.verify(CrcKind::S3Complement, u32::from(complement_crc), s3c),
        ];

        Section::Data(DataSection {
            encoding: MessageEncoding::Base3to250ByteData,
            data: data.to_vec(),
            mode,
            complement_data: Some(complement.to_vec()),
            complement_ok: Some(complement_ok),
            time_stamp: None,
            rollover: None,
            crcs,
        })
    }

    fn extended_short_data(&mut self, bytes: &[u8]) -> Section {
        let n = self.data_size;
        let data = &bytes[..n];
        let mode = self.mode_byte(bytes[n]);
        let time_stamp = u16::from_le_bytes([bytes[n + 3], bytes[n + 4]]);
        let received = reassemble_crc_s5(bytes[n + 1], bytes[n + 2], bytes[n + 5]);

        let crc = self.extended_crc(received, &mode, time_stamp, data);

        Section::Data(DataSection {
            encoding: MessageEncoding::Extended1or2ByteData,
            data: data.to_vec(),
            mode,
            complement_data: None,
            complement_ok: None,
            time_stamp: Some(time_stamp),
            rollover: self.rollover,
            crcs: vec![crc],
        })
    }

    fn extended_long_data(&mut self, bytes: &[u8]) -> Section {
        let n = self.data_size;
        let data = &bytes[..n];
        let mode = self.mode_byte(bytes[n]);
        let complement = &bytes[n + 3..2 * n + 3];
        let time_stamp = u16::from_le_bytes([bytes[2 * n + 3], bytes[2 * n + 4]]);
        let received = reassemble_crc_s5(bytes[n + 1], bytes[n + 2], bytes[2 * n + 5]);

        let complement_ok = self.check_complement(data, complement);
        let crc = self.extended_crc(received, &mode, time_stamp, data);

        Section::Data(DataSection {
            encoding: MessageEncoding::Extended3to250ByteData,
            data: data.to_vec(),
            mode,
            complement_data: Some(complement.to_vec()),
            complement_ok: Some(complement_ok),
            time_stamp: Some(time_stamp),
            rollover: self.rollover,
            crcs: vec![crc],
        })
    }

    /// CRC-S5 needs both the PID seed and this message's rollover annotation
    fn extended_crc(
        &mut self,
        received: u32,
        mode: &ModeByte,
        time_stamp: u16,
        data: &[u8],
    ) -> CrcField {
        let computed = match (self.seeds, self.rollover) {
            (Some(seeds), Some(rollover)) => {
                Some(chain::s5_data(seeds.s5, rollover, mode, time_stamp, data))
            }
            (Some(_), None) => {
                tracing::debug!("No rollover annotation, CRC-S5 left unverified");
                None
            }
            (None, _) => None,
        };
        self.verify(CrcKind::S5, received, computed)
    }

    fn base_time_stamp(&mut self, bytes: &[u8]) -> Section {
        let time_stamp = u16::from_le_bytes([bytes[0], bytes[1]]);
        let computed = match (self.seeds, self.mode) {
            (Some(seeds), Some(mode)) => {
                Some(u32::from(chain::s1_time_stamp(seeds.s1, &mode, time_stamp)))
            }
            _ => None,
        };
        let crc = self.verify(CrcKind::S1TimeStamp, u32::from(bytes[2]), computed);
        Section::TimeStamp(TimeStampSection { time_stamp, crc })
    }

    fn base_time_coordination(&mut self, bytes: &[u8]) -> Section {
        let ack = AckByte::from_byte(bytes[0]);
        let consumer_time = u16::from_le_bytes([bytes[1], bytes[2]]);
        let ack_byte_2 = bytes[3];
        let received = u16::from_le_bytes([bytes[4], bytes[5]]);

        self.anomalies.extend(ack.anomalies(Some(ack_byte_2)));
        let computed = self
            .seeds
            .map(|s| u32::from(chain::s3_time(s.s3, ack.raw, consumer_time)));
        let crc = self.verify(CrcKind::S3Time, u32::from(received), computed);

        Section::TimeCoordination(TimeCoordinationSection {
            encoding: MessageEncoding::BaseTimeCoordination,
            ack,
            ack_byte_2: Some(ack_byte_2),
            consumer_time,
            crc,
        })
    }

    fn extended_time_coordination(&mut self, bytes: &[u8]) -> Section {
        let ack = AckByte::from_byte(bytes[0]);
        let consumer_time = u16::from_le_bytes([bytes[1], bytes[2]]);
        let received = reassemble_crc_s5(bytes[3], bytes[4], bytes[5]);

        self.anomalies.extend(ack.anomalies(None));
        let computed = self
            .seeds
            .map(|s| chain::s5_time(s.s5, ack.raw, consumer_time));
        let crc = self.verify(CrcKind::S5Time, received, computed);

        Section::TimeCoordination(TimeCoordinationSection {
            encoding: MessageEncoding::ExtendedTimeCoordination,
            ack,
            ack_byte_2: None,
            consumer_time,
            crc,
        })
    }

    fn base_time_correction(&mut self, bytes: &[u8]) -> Section {
        let mcast = McastByte::from_byte(bytes[0]);
        let mcast_byte_2 = bytes[1];
        let time_correction = u16::from_le_bytes([bytes[2], bytes[3]]);
        let received = u16::from_le_bytes([bytes[4], bytes[5]]);

        self.anomalies.extend(mcast.anomalies(Some(mcast_byte_2)));
        let computed = self
            .seeds
            .map(|s| u32::from(chain::s3_time(s.s3, mcast.raw, time_correction)));
        let crc = self.verify(CrcKind::S3Time, u32::from(received), computed);

        Section::TimeCorrection(TimeCorrectionSection {
            encoding: MessageEncoding::BaseTimeCorrection,
            mcast,
            mcast_byte_2: Some(mcast_byte_2),
            time_correction,
            crc,
        })
    }

    fn extended_time_correction(&mut self, bytes: &[u8]) -> Section {
        let mcast = McastByte::from_byte(bytes[0]);
        let time_correction = u16::from_le_bytes([bytes[1], bytes[2]]);
        let received = reassemble_crc_s5(bytes[3], bytes[4], bytes[5]);

        self.anomalies.extend(mcast.anomalies(None));
        let computed = self
            .seeds
            .map(|s| chain::s5_time(s.s5, mcast.raw, time_correction));
        let crc = self.verify(CrcKind::S5Time, received, computed);

        Section::TimeCorrection(TimeCorrectionSection {
            encoding: MessageEncoding::ExtendedTimeCorrection,
            mcast,
            mcast_byte_2: None,
            time_correction,
            crc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MessageBuilder;
    use crate::control::with_even_parity;

    fn triad() -> ConnectionTriad {
        ConnectionTriad::new(1, 2, 3)
    }

    fn producer(format: SafetyFormat, multicast: bool) -> ConnectionContext {
        ConnectionContext {
            format,
            role: Some(Role::Producer),
            multicast,
            compute_crc: true,
            triad: triad(),
        }
    }

    fn consumer(format: SafetyFormat) -> ConnectionContext {
        ConnectionContext {
            role: Some(Role::Consumer),
            ..producer(format, false)
        }
    }

    fn statuses(message: &SafetyMessage) -> Vec<(CrcKind, CrcStatus)> {
        message.crcs().map(|c| (c.kind, c.status)).collect()
    }

    #[test]
    fn test_base_short_crcs_good() {
        let seeds = PidSeeds::new(&triad());
        let mode = ModeByte::from_byte(0x85);
        let s1 = chain::s1_data(seeds.s1, &mode, &[0x05]);
        let s2 = chain::s2_data(seeds.s2, &mode, &[0x05]);
        let ts = chain::s1_time_stamp(seeds.s1, &mode, 0x0010);
        let payload = [0x05, 0x85, s1, s2, 0x10, 0x00, ts];

        let message = SafetyMessage::decode(&payload, &producer(SafetyFormat::Base, false), None)
            .unwrap();
        assert_eq!(message.layout.primary(), MessageEncoding::Base1or2ByteData);
        assert_eq!(
            statuses(&message),
            vec![
                (CrcKind::S1, CrcStatus::Good),
                (CrcKind::S2, CrcStatus::Good),
                (CrcKind::S1TimeStamp, CrcStatus::Good),
            ]
        );
        assert!(message.is_intact());
        assert_eq!(message.time_stamp(), Some(0x0010));
        assert_eq!(message.data_section().unwrap().data, vec![0x05]);
    }

    #[test]
    fn test_captured_payloads_verify() {
        // Triad {1, 2, 3}, mode 0x85
        let base_short = [0x05, 0x85, 0xA7, 0x95, 0x10, 0x00, 0x83];
        let base_long = [
            0x01, 0x02, 0x03, 0x04, 0x85, 0xC3, 0x6F, 0xFE, 0xFD, 0xFC, 0xFB, 0xD8, 0x6D, 0x34,
            0x12, 0x86,
        ];
        let extended_short = [0x11, 0x22, 0x85, 0x29, 0x75, 0x00, 0x40, 0x1B];
        let extended_wrapped = [0x11, 0x22, 0x85, 0x02, 0x18, 0x00, 0x40, 0x0C];
        let extended_time_coordination = [0x81, 0x64, 0x00, 0x4F, 0x3E, 0x43];

        let base = producer(SafetyFormat::Base, false);
        let message = SafetyMessage::decode(&base_short, &base, None).unwrap();
        assert!(message.crcs().all(|c| c.status == CrcStatus::Good));
        let message = SafetyMessage::decode(&base_long, &base, None).unwrap();
        assert_eq!(message.layout.primary(), MessageEncoding::Base3to250ByteData);
        assert!(message.crcs().all(|c| c.status == CrcStatus::Good));
        assert_eq!(message.time_stamp(), Some(0x1234));

        let extended = producer(SafetyFormat::Extended, false);
        let message = SafetyMessage::decode(&extended_short, &extended, Some(0)).unwrap();
        assert_eq!(statuses(&message), vec![(CrcKind::S5, CrcStatus::Good)]);
        assert_eq!(message.crc(CrcKind::S5).unwrap().received, 0x001B_7529);
        let message = SafetyMessage::decode(&extended_wrapped, &extended, Some(1)).unwrap();
        assert_eq!(message.crc(CrcKind::S5).unwrap().status, CrcStatus::Good);
        let message = SafetyMessage::decode(&extended_wrapped, &extended, Some(0)).unwrap();
        assert!(message.crc(CrcKind::S5).unwrap().status.is_bad());

        let message = SafetyMessage::decode(
            &extended_time_coordination,
            &consumer(SafetyFormat::Extended),
            None,
        )
        .unwrap();
        assert_eq!(statuses(&message), vec![(CrcKind::S5Time, CrcStatus::Good)]);
    }

    #[test]
    fn test_base_short_flipped_data_fails_crcs() {
        let builder = MessageBuilder::new(SafetyFormat::Base, &triad());
        let mut payload = builder
            .data(&[0x05], ModeByte::from_byte(0x85), 0x0010, 0)
            .unwrap();
        payload[0] ^= 0x01;

        let message = SafetyMessage::decode(&payload, &producer(SafetyFormat::Base, false), None)
            .unwrap();
        assert!(message.crc(CrcKind::S1).unwrap().status.is_bad());
        assert!(message.crc(CrcKind::S2).unwrap().status.is_bad());
        assert_eq!(
            message.crc(CrcKind::S1TimeStamp).unwrap().status,
            CrcStatus::Good
        );
        assert!(!message.is_intact());
    }

    #[test]
    fn test_redundancy_violation_does_not_affect_crcs() {
        // TBD and NotTBD both set; CRCs only cover bits 5-7 and the ping count
        let builder = MessageBuilder::new(SafetyFormat::Base, &triad());
        let payload = builder
            .data(&[0x05], ModeByte::from_byte(0xA5), 0x0010, 0)
            .unwrap();

        let message = SafetyMessage::decode(&payload, &producer(SafetyFormat::Base, false), None)
            .unwrap();
        assert_eq!(message.anomalies, vec![Anomaly::TbdNotComplemented]);
        assert!(message.crcs().all(|c| c.status == CrcStatus::Good));
    }

    #[test]
    fn test_base_long_complement_flip() {
        let builder = MessageBuilder::new(SafetyFormat::Base, &triad());
        let mode = ModeByte::consistent(true, false, false, 2);
        let mut payload = builder.data(&[1, 2, 3, 4], mode, 500, 0).unwrap();
        // first complement byte
        payload[7] ^= 0x10;

        let message = SafetyMessage::decode(&payload, &producer(SafetyFormat::Base, false), None)
            .unwrap();
        let data = message.data_section().unwrap();
        assert_eq!(data.complement_ok, Some(false));
        assert_eq!(
            message
                .anomalies
                .iter()
                .filter(|a| **a == Anomaly::DataNotComplemented)
                .count(),
            1
        );
        assert_eq!(message.crc(CrcKind::S3).unwrap().status, CrcStatus::Good);
        assert!(message.crc(CrcKind::S3Complement).unwrap().status.is_bad());
    }

    #[test]
    fn test_base_long_multicast_round_trip() {
        let builder =
            MessageBuilder::new(SafetyFormat::Base, &triad()).with_time_correction(0x81, 0x0203);
        let mode = ModeByte::consistent(false, true, true, 3);
        let payload = builder.data(&[9, 8, 7, 6, 5], mode, 77, 0).unwrap();

        let message = SafetyMessage::decode(&payload, &producer(SafetyFormat::Base, true), None)
            .unwrap();
        assert!(message.is_intact());
        let correction = message.time_correction().unwrap();
        assert_eq!(correction.time_correction, 0x0203);
        assert_eq!(correction.mcast_byte_2, Some(!0x81));
        assert_eq!(message.time_stamp(), Some(77));
    }

    #[test]
    fn test_crc_disabled_is_unverified() {
        let context = ConnectionContext {
            compute_crc: false,
            ..producer(SafetyFormat::Base, false)
        };
        let payload = [0x05, 0x85, 0x00, 0x00, 0x10, 0x00, 0x00];
        let message = SafetyMessage::decode(&payload, &context, None).unwrap();
        assert!(message
            .crcs()
            .all(|c| c.status == CrcStatus::Unverified));
        assert!(message.anomalies.is_empty());
    }

    #[test]
    fn test_unresolved_role() {
        let context = ConnectionContext {
            role: None,
            ..producer(SafetyFormat::Base, false)
        };
        assert_eq!(
            SafetyMessage::decode(&[0; 7], &context, None),
            Err(ProtocolError::Unresolved)
        );
    }

    #[test]
    fn test_malformed_short_input() {
        let result = SafetyMessage::decode(&[0; 4], &producer(SafetyFormat::Base, false), None);
        assert!(matches!(result, Err(ProtocolError::TooShort { .. })));
    }

    #[test]
    fn test_payload_shorter_than_layout() {
        let layout =
            MessageLayout::resolve(SafetyFormat::Base, Role::Producer, false, 7).unwrap();
        let result = SafetyMessage::decode_with_layout(
            &[0; 6],
            layout,
            &producer(SafetyFormat::Base, false),
            None,
        );
        assert_eq!(
            result,
            Err(ProtocolError::TooShort {
                actual: 6,
                required: 7
            })
        );
    }

    #[test]
    fn test_extended_short_with_rollover() {
        let builder = MessageBuilder::new(SafetyFormat::Extended, &triad());
        let mode = ModeByte::consistent(true, false, false, 1);
        let payload = builder.data(&[0x11, 0x22], mode, 0x4000, 3).unwrap();
        let context = producer(SafetyFormat::Extended, false);

        let message = SafetyMessage::decode(&payload, &context, Some(3)).unwrap();
        assert!(message.is_intact());
        let data = message.data_section().unwrap();
        assert_eq!(data.time_stamp, Some(0x4000));
        assert_eq!(data.rollover, Some(3));

        let wrong = SafetyMessage::decode(&payload, &context, Some(4)).unwrap();
        assert!(wrong.crc(CrcKind::S5).unwrap().status.is_bad());
        assert!(matches!(
            wrong.anomalies.as_slice(),
            [Anomaly::CrcMismatch {
                kind: CrcKind::S5,
                ..
            }]
        ));
    }

    #[test]
    fn test_extended_without_rollover_is_unverified() {
        let builder = MessageBuilder::new(SafetyFormat::Extended, &triad());
        let mode = ModeByte::consistent(true, false, false, 1);
        let payload = builder.data(&[1, 2, 3], mode, 0x0100, 0).unwrap();

        let context = producer(SafetyFormat::Extended, false);
        let message = SafetyMessage::decode(&payload, &context, None).unwrap();
        assert_eq!(message.layout.primary(), MessageEncoding::Extended3to250ByteData);
        assert_eq!(message.crc(CrcKind::S5).unwrap().status, CrcStatus::Unverified);
        assert!(message.anomalies.is_empty());
        assert_eq!(message.time_stamp(), Some(0x0100));
    }

    #[test]
    fn test_base_time_coordination() {
        let builder = MessageBuilder::new(SafetyFormat::Base, &triad());
        let ack = with_even_parity(0x01);
        let payload = builder.time_coordination(ack, 0x1234);

        let message = SafetyMessage::decode(&payload, &consumer(SafetyFormat::Base), None).unwrap();
        let coordination = message.time_coordination().unwrap();
        assert_eq!(coordination.consumer_time, 0x1234);
        assert!(coordination.ack.ping_count_reply);
        assert_eq!(coordination.crc.status, CrcStatus::Good);
        assert!(message.is_intact());
        assert_eq!(message.time_stamp(), None);
    }

    #[test]
    fn test_time_coordination_ack_not_complemented() {
        let builder = MessageBuilder::new(SafetyFormat::Base, &triad());
        let mut payload = builder.time_coordination(with_even_parity(0x01), 0x1234);
        payload[3] ^= 0x01;

        let message = SafetyMessage::decode(&payload, &consumer(SafetyFormat::Base), None).unwrap();
        assert_eq!(message.anomalies, vec![Anomaly::AckByteNotComplemented]);
        assert_eq!(
            message.time_coordination().unwrap().crc.status,
            CrcStatus::Good
        );
    }

    #[test]
    fn test_extended_time_coordination_bad_crc() {
        let builder = MessageBuilder::new(SafetyFormat::Extended, &triad());
        let mut payload = builder.time_coordination(with_even_parity(0x08), 0x0042);
        payload[5] ^= 0xFF;

        let message =
            SafetyMessage::decode(&payload, &consumer(SafetyFormat::Extended), None).unwrap();
        assert!(message.crc(CrcKind::S5Time).unwrap().status.is_bad());
    }

    #[test]
    fn test_extended_time_correction() {
        let builder = MessageBuilder::new(SafetyFormat::Extended, &triad())
            .with_time_correction(with_even_parity(0x21), 0x0500);
        let mode = ModeByte::consistent(true, false, false, 0);
        let payload = builder.data(&[0xAA], mode, 10, 0).unwrap();
        assert_eq!(payload.len(), 13);

        let message =
            SafetyMessage::decode(&payload, &producer(SafetyFormat::Extended, true), Some(0))
                .unwrap();
        let correction = message.time_correction().unwrap();
        assert_eq!(correction.encoding, MessageEncoding::ExtendedTimeCorrection);
        assert_eq!(correction.time_correction, 0x0500);
        assert_eq!(correction.mcast.consumer_number, 1);
        assert!(message.is_intact());
    }
}
