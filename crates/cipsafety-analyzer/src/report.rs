//! JSON analysis report

use crate::trace::TraceMessage;
use cipsafety_core::{AnalysisResult, AnalyzerError, MessageId};
use cipsafety_protocol::{Anomaly, CrcField, CrcStatus, MessageEncoding, Role, TransportDirection};
use serde::Serialize;

/// Outcome of one message in one pass
#[derive(Debug, Clone, Serialize)]
pub struct MessageReport {
    pub frame: MessageId,
    pub connection: String,
    pub direction: TransportDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<MessageEncoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollover: Option<u16>,
    pub crcs: Vec<CrcField>,
    pub anomalies: Vec<Anomaly>,
    /// Set when the message could not be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageReport {
    #[must_use]
    pub fn new(message: &TraceMessage, result: &Result<AnalysisResult, AnalyzerError>) -> Self {
        let mut report = Self {
            frame: message.frame,
            connection: message.connection.clone(),
            direction: message.direction,
            role: None,
            encoding: None,
            time_stamp: None,
            rollover: None,
            crcs: Vec::new(),
            anomalies: Vec::new(),
            error: None,
        };
        match result {
            Ok(analysis) => {
                report.role = Some(analysis.role);
                report.encoding = Some(analysis.message.layout.primary());
                report.time_stamp = analysis.message.time_stamp();
                report.rollover = analysis.annotation.map(|a| a.rollover_value);
                report.crcs = analysis.message.crcs().copied().collect();
                report.anomalies.clone_from(&analysis.message.anomalies);
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }

    /// Everything a replay pass must reproduce
    fn fingerprint(&self) -> (MessageId, Option<u16>, usize, bool) {
        (
            self.frame,
            self.rollover,
            self.anomalies.len(),
            self.error.is_some(),
        )
    }
}

/// Counters for one pass over the trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: usize,
    pub decoded: usize,
    pub intact: usize,
    pub with_anomalies: usize,
    pub unverified_crcs: usize,
    pub failed: usize,
}

impl PassSummary {
    #[must_use]
    pub fn new(pass: usize, reports: &[MessageReport]) -> Self {
        let mut summary = Self {
            pass,
            ..Self::default()
        };
        for report in reports {
            if report.error.is_some() {
                summary.failed += 1;
                continue;
            }
            summary.decoded += 1;
            if report.anomalies.is_empty() {
                if report.crcs.iter().all(|c| c.status == CrcStatus::Good) {
                    summary.intact += 1;
                }
            } else {
                summary.with_anomalies += 1;
            }
            summary.unverified_crcs += report
                .crcs
                .iter()
                .filter(|c| c.status == CrcStatus::Unverified)
                .count();
        }
        summary
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub connections: usize,
    pub passes: Vec<PassSummary>,
    /// True when every replay pass reproduced the first pass
    pub replay_consistent: bool,
    /// First-pass results
    pub messages: Vec<MessageReport>,
}

/// Compare a replay pass against the first pass
#[must_use]
pub fn replay_matches(first: &[MessageReport], replay: &[MessageReport]) -> bool {
    first.len() == replay.len()
        && first
            .iter()
            .zip(replay)
            .all(|(a, b)| a.fingerprint() == b.fingerprint())
}
