//! Connection status and the externally published status record.

use serde::{Deserialize, Serialize};

use crate::clock::unix_timestamp;

/// Lifecycle state of the worker's single network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// No connection attempt has started yet.
    Uninitialized,
    /// The client is establishing or restoring a session.
    Authenticating,
    /// A fresh session needs out-of-band pairing by an operator.
    PairingRequired,
    /// The connection is usable for sends.
    Connected,
    /// The connection dropped; a recovery episode will follow.
    Disconnected,
}

/// Externally readable projection of the connection state.
///
/// Published as a whole-record overwrite on every transition; observers
/// only ever see the latest write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: ConnectionStatus,
    /// Unix timestamp (seconds) of the transition.
    pub timestamp: i64,
    /// Renderable pairing artifact, present only while pairing is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
}

impl StatusRecord {
    /// Create a record for a transition without a pairing artifact.
    #[must_use]
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status,
            timestamp: unix_timestamp(),
            qr_code_url: None,
        }
    }

    /// Create a record carrying a pairing artifact.
    #[must_use]
    pub fn with_artifact(status: ConnectionStatus, artifact: impl Into<String>) -> Self {
        Self {
            status,
            timestamp: unix_timestamp(),
            qr_code_url: Some(artifact.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_screaming_snake_wire_names() {
        let json = serde_json::to_string(&ConnectionStatus::PairingRequired).unwrap();
        assert_eq!(json, "\"PAIRING_REQUIRED\"");

        let parsed: ConnectionStatus = serde_json::from_str("\"CONNECTED\"").unwrap();
        assert_eq!(parsed, ConnectionStatus::Connected);
    }

    #[test]
    fn record_omits_absent_artifact() {
        let record = StatusRecord::new(ConnectionStatus::Connected);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("qrCodeUrl"));

        let record = StatusRecord::with_artifact(ConnectionStatus::PairingRequired, "data:x");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"qrCodeUrl\":\"data:x\""));
    }
}
