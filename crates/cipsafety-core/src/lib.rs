//! CIP Safety analysis core
//!
//! This crate keeps the stateful side of CIP Safety analysis on top of the
//! stateless decoder in `cipsafety-protocol`: connection bookkeeping,
//! timestamp rollover tracking across first and replay passes, and the
//! analyzer pipeline that ties them together.

pub mod analyzer;
pub mod connection;
pub mod error;
pub mod persistence;
pub mod rollover;

pub use analyzer::{AnalysisResult, AnalyzerEvent, SafetyAnalyzer};
pub use connection::{ConnectionRegistry, SafetyConnection};
pub use error::AnalyzerError;
pub use rollover::{
    ConnectionKey, ConnectionTimeState, MessageId, PacketTimeAnnotation, RolloverTracker,
    TrackingPhase,
};
