//! Core abstractions for the courier messaging worker.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionBlob` / `StatusRecord` - Persisted session and status documents
//! - `RecipientId` / `OutboundMessage` - Canonical recipients and queued sends
//! - `ClientEvent` - The ordered lifecycle event stream
//! - SessionStore, StatusPublisher, NetworkClient and PairingRenderer traits

pub mod clock;
pub mod message;
pub mod status;
pub mod traits;

pub use clock::unix_timestamp;
pub use message::{OutboundMessage, RecipientId};
pub use status::{ConnectionStatus, StatusRecord};
pub use traits::{
    ClientError, ClientEvent, NetworkClient, PairingRenderer, RenderError, SessionBlob,
    SessionStore, StatusPublisher, StoreError, TextPairingRenderer,
};
