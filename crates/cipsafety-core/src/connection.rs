//! Safety connection table

use crate::error::AnalyzerError;
use cipsafety_protocol::{
    ConnectionContext, ConnectionTriad, Role, SafetyFormat, SafetySegment, TransportDirection,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A CIP Safety connection as established by its Forward Open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConnection {
    /// Caller-chosen connection identifier
    pub id: String,
    /// `None` when the Forward Open was not captured; CRCs stay unverified
    #[serde(default)]
    pub triad: Option<ConnectionTriad>,
    pub format: SafetyFormat,
    /// Direction in which safety I/O data flows
    #[serde(default)]
    pub producer_direction: Option<TransportDirection>,
    #[serde(default)]
    pub multicast: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<SafetySegment>,
}

impl SafetyConnection {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        triad: ConnectionTriad,
        format: SafetyFormat,
        producer_direction: TransportDirection,
    ) -> Self {
        Self {
            id: id.into(),
            triad: Some(triad),
            format,
            producer_direction: Some(producer_direction),
            multicast: false,
            segment: None,
        }
    }

    #[must_use]
    pub fn multicast(mut self, multicast: bool) -> Self {
        self.multicast = multicast;
        self
    }

    /// Decoding context for a message travelling in `direction`
    #[must_use]
    pub fn context(&self, direction: TransportDirection) -> ConnectionContext {
        ConnectionContext {
            format: self.format,
            role: Role::resolve(self.producer_direction, direction),
            multicast: self.multicast,
            compute_crc: self.triad.is_some(),
            triad: self.triad.unwrap_or_else(|| ConnectionTriad::new(0, 0, 0)),
        }
    }
}

/// Known safety connections, keyed by id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, SafetyConnection>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a connection, returning the previous entry
    pub fn register(&self, connection: SafetyConnection) -> Option<SafetyConnection> {
        tracing::info!(
            "Registered {} connection {} ({})",
            connection.format,
            connection.id,
            connection
                .triad
                .map_or_else(|| "no triad".to_string(), |t| t.to_string())
        );
        self.connections.insert(connection.id.clone(), connection)
    }

    /// Register a connection from the Safety Network Segment of its Forward Open.
    ///
    /// The segment decides the connection's format.
    #[allow(clippy::missing_errors_doc)]
    pub fn register_from_segment(
        &self,
        id: impl Into<String>,
        triad: ConnectionTriad,
        producer_direction: TransportDirection,
        multicast: bool,
        segment: &[u8],
    ) -> Result<SafetyConnection, AnalyzerError> {
        let id = id.into();
        let segment = SafetySegment::parse(segment)?;
        for anomaly in segment.anomalies() {
            tracing::info!("Connection {}: {}", id, anomaly);
        }

        let connection = SafetyConnection {
            id,
            triad: Some(triad),
            format: segment.format,
            producer_direction: Some(producer_direction),
            multicast,
            segment: Some(segment),
        };
        self.register(connection.clone());
        Ok(connection)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<SafetyConnection> {
        self.connections.get(id).map(|c| c.clone())
    }

    pub fn remove(&self, id: &str) -> Option<SafetyConnection> {
        let removed = self.connections.remove(id).map(|(_, c)| c);
        if removed.is_some() {
            tracing::info!("Removed connection {}", id);
        }
        removed
    }

    /// All connections, ordered by id
    #[must_use]
    pub fn connections(&self) -> Vec<SafetyConnection> {
        let mut connections: Vec<_> = self.connections.iter().map(|c| c.clone()).collect();
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        connections
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Decoding context for a message on connection `id`
    #[allow(clippy::missing_errors_doc)]
    pub fn context_for(
        &self,
        id: &str,
        direction: TransportDirection,
    ) -> Result<ConnectionContext, AnalyzerError> {
        self.connections
            .get(id)
            .map(|c| c.context(direction))
            .ok_or_else(|| AnalyzerError::UnknownConnection(id.to_string()))
    }
}
