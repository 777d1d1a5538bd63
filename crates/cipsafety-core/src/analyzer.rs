//! Per-message analysis pipeline

use crate::connection::{ConnectionRegistry, SafetyConnection};
use crate::error::AnalyzerError;
use crate::persistence;
use crate::rollover::{ConnectionKey, MessageId, PacketTimeAnnotation, RolloverTracker};
use cipsafety_protocol::{
    Anomaly, ConnectionTriad, MessageEncoding, Role, SafetyMessage, TransportDirection,
};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Analyzer events
#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
    /// A connection was added to the registry
    ConnectionRegistered { id: String },
    /// A message was decoded
    MessageDecoded {
        message: MessageId,
        connection: String,
        encoding: MessageEncoding,
        intact: bool,
        replay: bool,
    },
    /// A decoded message carried integrity anomalies
    Anomalies {
        message: MessageId,
        connection: String,
        anomalies: Vec<Anomaly>,
    },
    /// A payload could not be resolved into a layout
    Malformed {
        message: MessageId,
        connection: String,
        reason: String,
    },
}

/// Result of analyzing one message
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub message_id: MessageId,
    pub connection: String,
    pub direction: TransportDirection,
    pub role: Role,
    /// Rollover annotation of producer messages with a known triad
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<PacketTimeAnnotation>,
    /// True when the annotation came from the cache
    pub replay: bool,
    pub message: SafetyMessage,
}

/// Ties the connection registry and rollover tracker to the decoder
pub struct SafetyAnalyzer {
    registry: ConnectionRegistry,
    tracker: RolloverTracker,
    /// Event broadcaster
    event_tx: broadcast::Sender<AnalyzerEvent>,
    /// Path to the connection table, when persisted
    data_path: Option<PathBuf>,
}

impl Default for SafetyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyAnalyzer {
    /// Create an analyzer with an empty, unpersisted connection table
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            registry: ConnectionRegistry::new(),
            tracker: RolloverTracker::new(),
            event_tx,
            data_path: None,
        }
    }

    /// Create an analyzer backed by `connections.json` in `data_dir`
    pub async fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_path = data_dir.into().join("connections.json");
        let mut analyzer = Self::new();
        for connection in persistence::load_connections(&data_path).await {
            analyzer.registry.register(connection);
        }
        analyzer.data_path = Some(data_path);
        analyzer
    }

    /// Subscribe to analyzer events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn tracker(&self) -> &RolloverTracker {
        &self.tracker
    }

    /// Add or replace a connection
    pub fn register(&self, connection: SafetyConnection) {
        let id = connection.id.clone();
        self.registry.register(connection);
        let _ = self.event_tx.send(AnalyzerEvent::ConnectionRegistered { id });
    }

    /// Add a connection from the Safety Network Segment of its Forward Open
    #[allow(clippy::missing_errors_doc)]
    pub fn register_from_segment(
        &self,
        id: impl Into<String>,
        triad: ConnectionTriad,
        producer_direction: TransportDirection,
        multicast: bool,
        segment: &[u8],
    ) -> Result<SafetyConnection, AnalyzerError> {
        let connection = self.registry.register_from_segment(
            id,
            triad,
            producer_direction,
            multicast,
            segment,
        )?;
        let _ = self.event_tx.send(AnalyzerEvent::ConnectionRegistered {
            id: connection.id.clone(),
        });
        Ok(connection)
    }

    /// Persist the connection table, if a data directory was configured
    #[allow(clippy::missing_errors_doc)]
    pub async fn save(&self) -> Result<(), AnalyzerError> {
        if let Some(path) = &self.data_path {
            persistence::save_connections(path, &self.registry.connections()).await?;
        }
        Ok(())
    }

    /// Analyze one captured payload.
    ///
    /// On the first pass messages must be fed in capture order per connection
    /// direction. Later passes may repeat any message; its rollover annotation
    /// is read back instead of recomputed.
    #[allow(clippy::missing_errors_doc)]
    pub fn analyze(
        &self,
        message_id: MessageId,
        connection_id: &str,
        direction: TransportDirection,
        payload: &[u8],
    ) -> Result<AnalysisResult, AnalyzerError> {
        let context = self.registry.context_for(connection_id, direction)?;
        // Rollover is only tracked when the triad is known
        let key = context
            .compute_crc
            .then(|| ConnectionKey::new(context.triad, direction));

        // Malformed payloads leave the tracker untouched
        let layout = match context.layout(payload.len()) {
            Ok(layout) => layout,
            Err(e) => {
                tracing::warn!(
                    "Message {} on {} ({}): {}",
                    message_id,
                    connection_id,
                    direction,
                    e
                );
                let _ = self.event_tx.send(AnalyzerEvent::Malformed {
                    message: message_id,
                    connection: connection_id.to_string(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let replay = key.is_some_and(|k| self.tracker.annotation(&k, message_id).is_some());
        let annotation = match (layout.time_stamp(payload), key) {
            (Some(time_stamp), Some(key)) => {
                Some(self.tracker.annotate(key, message_id, time_stamp))
            }
            _ => None,
        };

        let role = layout.role;
        let message = SafetyMessage::decode_with_layout(
            payload,
            layout,
            &context,
            annotation.map(|a| a.rollover_value),
        )?;

        if !message.anomalies.is_empty() {
            if replay {
                tracing::debug!(
                    "Message {} on {}: {} anomalies (replay)",
                    message_id,
                    connection_id,
                    message.anomalies.len()
                );
            } else {
                for anomaly in &message.anomalies {
                    tracing::warn!("Message {} on {}: {}", message_id, connection_id, anomaly);
                }
            }
            let _ = self.event_tx.send(AnalyzerEvent::Anomalies {
                message: message_id,
                connection: connection_id.to_string(),
                anomalies: message.anomalies.clone(),
            });
        }

        let _ = self.event_tx.send(AnalyzerEvent::MessageDecoded {
            message: message_id,
            connection: connection_id.to_string(),
            encoding: message.layout.primary(),
            intact: message.is_intact(),
            replay,
        });

        Ok(AnalysisResult {
            message_id,
            connection: connection_id.to_string(),
            direction,
            role,
            annotation,
            replay,
            message,
        })
    }
}
