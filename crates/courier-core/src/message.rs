//! Canonical recipients and outbound messages.

use serde::Serialize;
use uuid::Uuid;

use crate::clock::unix_timestamp;

/// Canonical recipient identifier: digits plus the network's domain suffix,
/// e.g. `5511999999999@c.us`.
///
/// Only constructed through [`RecipientId::normalize`], so a value of this
/// type is always in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Normalize a raw recipient by stripping every non-digit character and
    /// appending the domain suffix.
    ///
    /// Returns `None` when no digits remain, which callers must treat as a
    /// validation failure.
    #[must_use]
    pub fn normalize(raw: &str, domain_suffix: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        Some(Self(format!("{digits}@{domain_suffix}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digit portion, without the domain suffix.
    #[must_use]
    pub fn digits(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An accepted outbound message, alive only while it sits in the send queue.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub recipient: RecipientId,
    pub body: String,
    /// Unix timestamp (seconds) at which the send was accepted.
    pub accepted_at: i64,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(recipient: RecipientId, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            body,
            accepted_at: unix_timestamp(),
        }
    }
}
