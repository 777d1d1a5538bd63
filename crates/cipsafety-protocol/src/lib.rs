//! CIP Safety message integrity engine
//!
//! This crate classifies CIP Safety payloads into their Base/Extended,
//! short/long, time coordination and time correction encodings, and
//! recomputes the CRC-S1/S2/S3/S5 chains, mode byte redundancy and
//! complement data checks that protect them.

pub mod builder;
pub mod chain;
pub mod complement;
pub mod control;
pub mod crc;
pub mod encoding;
pub mod message;
pub mod mode;
pub mod segment;
pub mod triad;
pub mod types;

pub use builder::MessageBuilder;
pub use complement::complement_check;
pub use control::{AckByte, McastByte};
pub use crc::{crc_update, CrcFamily};
pub use encoding::{MessageEncoding, MessageLayout, SectionLayout};
pub use message::{ConnectionContext, SafetyMessage, Section};
pub use mode::ModeByte;
pub use segment::SafetySegment;
pub use triad::{triad_seed, ConnectionTriad, PidSeeds};
pub use types::*;
