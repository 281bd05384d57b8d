//! Contracts between the connection manager, the persistence backends and
//! the underlying network client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::RecipientId;
use crate::status::StatusRecord;

/// Opaque authenticated-session payload for the messaging network.
///
/// The worker never inspects the contents; it only shuttles the blob between
/// the network client and the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBlob(serde_json::Value);

impl SessionBlob {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Persistence backend error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored document is corrupt: {0}")]
    Corrupt(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Single-slot persistence contract for the session blob.
///
/// The store holds at most one blob per deployment. `save` is an idempotent
/// upsert with last-writer-wins semantics; absence is a normal outcome
/// (`extract` returns `Ok(None)`), never an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert the singleton session blob.
    async fn save(&self, blob: &SessionBlob) -> Result<(), StoreError>;

    /// Whether a blob is currently stored.
    async fn exists(&self) -> Result<bool, StoreError>;

    /// The stored blob, or `None` when the slot is empty.
    async fn extract(&self) -> Result<Option<SessionBlob>, StoreError>;

    /// Remove the stored blob; afterwards `exists` reports false.
    async fn delete(&self) -> Result<(), StoreError>;
}

/// Idempotent whole-record overwrite of the external status document.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, record: &StatusRecord) -> Result<(), StoreError>;
}

/// Network client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Lifecycle event emitted by the network client.
///
/// Events arrive on a single ordered channel and are consumed one at a time
/// by the connection manager's state-machine loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// No usable session (or the session was rejected); an operator must
    /// complete pairing out-of-band using the attached payload.
    PairingRequired { payload: String },
    /// The connection became usable.
    Ready,
    /// The client confirmed it persisted the session; informational only.
    SessionPersisted,
    /// The connection dropped, with an opaque reason from the network.
    Disconnected { reason: String },
}

/// Opaque capability over the underlying protocol client.
///
/// The connection manager owns the lifecycle side (`initialize`,
/// `export_session`); the dispatcher only issues send and query calls.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Begin an authentication episode, using `store` as the session
    /// recovery backend. Outcomes are reported as [`ClientEvent`]s.
    async fn initialize(&self, store: Arc<dyn SessionStore>) -> Result<(), ClientError>;

    /// Whether the canonical recipient is a registered network participant.
    async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError>;

    /// Transmit a text message.
    async fn send_text(&self, recipient: &RecipientId, body: &str) -> Result<(), ClientError>;

    /// Show the transient "composing" presence indicator to the recipient.
    async fn set_composing(&self, recipient: &RecipientId) -> Result<(), ClientError>;

    /// Clear the presence indicator.
    async fn clear_composing(&self, recipient: &RecipientId) -> Result<(), ClientError>;

    /// Export the current session blob for periodic backup.
    async fn export_session(&self) -> Result<SessionBlob, ClientError>;
}

/// Pairing artifact rendering error.
#[derive(Debug, Error)]
#[error("failed to render pairing artifact: {0}")]
pub struct RenderError(pub String);

/// Turns a raw pairing payload into a displayable artifact.
///
/// Real QR-image rendering lives outside this workspace; the worker only
/// needs something an admin surface can display.
pub trait PairingRenderer: Send + Sync {
    fn render(&self, payload: &str) -> Result<String, RenderError>;
}

/// Fallback renderer that wraps the payload in a text data URL.
pub struct TextPairingRenderer;

impl PairingRenderer for TextPairingRenderer {
    fn render(&self, payload: &str) -> Result<String, RenderError> {
        if payload.is_empty() {
            return Err(RenderError("empty pairing payload".into()));
        }
        Ok(format!("data:text/plain,{payload}"))
    }
}
