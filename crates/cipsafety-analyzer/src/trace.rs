//! Captured trace input
//!
//! ```json
//! {
//!   "connections": [{"id": "cell", "triad": {...}, "format": "extended"}],
//!   "forward_opens": [{"id": "door", "triad": {...}, "segment": "0200..."}],
//!   "messages": [{"frame": 1, "connection": "cell", "payload": "0185..."}]
//! }
//! ```

use anyhow::Context;
use bytes::Bytes;
use cipsafety_core::{MessageId, SafetyConnection};
use cipsafety_protocol::{ConnectionTriad, TransportDirection};
use serde::{Deserialize, Deserializer};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub connections: Vec<SafetyConnection>,
    #[serde(default)]
    pub forward_opens: Vec<ForwardOpen>,
    pub messages: Vec<TraceMessage>,
}

/// Connection known only from its Safety Network Segment
#[derive(Debug, Deserialize)]
pub struct ForwardOpen {
    pub id: String,
    pub triad: ConnectionTriad,
    pub producer_direction: TransportDirection,
    #[serde(default)]
    pub multicast: bool,
    #[serde(deserialize_with = "hex_bytes")]
    pub segment: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceMessage {
    pub frame: MessageId,
    pub connection: String,
    pub direction: TransportDirection,
    #[serde(deserialize_with = "hex_bytes")]
    pub payload: Bytes,
}

/// Hex string, optionally separated by spaces or colons
fn hex_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    let s = String::deserialize(deserializer)?;
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    hex::decode(digits).map(Bytes::from).map_err(serde::de::Error::custom)
}

impl Trace {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read trace {:?}", path))?;
        let trace = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse trace {:?}", path))?;
        tracing::info!(
            "Loaded {} messages, {} connections and {} forward opens from {:?}",
            trace.messages.len(),
            trace.connections.len(),
            trace.forward_opens.len(),
            path
        );
        Ok(trace)
    }

    /// Parse a trace; messages come back in frame order
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut trace: Trace = serde_json::from_str(json)?;
        trace.messages.sort_by_key(|m| m.frame);
        Ok(trace)
    }
}
