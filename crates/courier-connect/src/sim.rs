//! Simulated network client for local development.
//!
//! Stands in for the real protocol client: it pairs against an empty store
//! (auto-completing after a short delay, as if an operator scanned the
//! code), restores silently when a session blob exists, and logs deliveries
//! instead of transmitting them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    ClientError, ClientEvent, RecipientId, SessionBlob, SessionStore, unix_timestamp,
};
use rand::{Rng, distributions::Alphanumeric};
use tokio::sync::mpsc;

const MIN_REGISTERED_DIGITS: usize = 8;

/// Simulated client.
pub struct SimClient {
    events: mpsc::Sender<ClientEvent>,
    connected: Arc<AtomicBool>,
    pairing_delay: Duration,
}

impl SimClient {
    /// Create the client together with its lifecycle event channel.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        Self::with_pairing_delay(Duration::from_secs(5))
    }

    /// Create a client whose simulated operator pairs after `pairing_delay`.
    #[must_use]
    pub fn with_pairing_delay(pairing_delay: Duration) -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        let (events, rx) = mpsc::channel(32);
        (
            Arc::new(Self {
                events,
                connected: Arc::new(AtomicBool::new(false)),
                pairing_delay,
            }),
            rx,
        )
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn session_blob() -> SessionBlob {
        SessionBlob::new(serde_json::json!({
            "kind": "sim",
            "issued_at": unix_timestamp(),
        }))
    }
}

#[async_trait]
impl courier_core::NetworkClient for SimClient {
    async fn initialize(&self, store: Arc<dyn SessionStore>) -> Result<(), ClientError> {
        let restored = store
            .extract()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if restored.is_some() {
            tracing::info!("simulated client restored stored session");
            self.connected.store(true, Ordering::SeqCst);
            let _ = self.events.send(ClientEvent::Ready).await;
            let _ = self.events.send(ClientEvent::SessionPersisted).await;
            return Ok(());
        }

        let payload: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        tracing::info!("simulated client requires pairing");
        let _ = self
            .events
            .send(ClientEvent::PairingRequired { payload })
            .await;

        // Pretend an operator completes pairing after a delay, creating a
        // fresh session the store can restore next time.
        let events = self.events.clone();
        let connected = Arc::clone(&self.connected);
        let delay = self.pairing_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.save(&Self::session_blob()).await {
                tracing::error!(error = %e, "simulated pairing could not save session");
                return;
            }
            connected.store(true, Ordering::SeqCst);
            let _ = events.send(ClientEvent::Ready).await;
            let _ = events.send(ClientEvent::SessionPersisted).await;
        });

        Ok(())
    }

    async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError> {
        self.ensure_connected()?;
        Ok(recipient.digits().len() >= MIN_REGISTERED_DIGITS)
    }

    async fn send_text(&self, recipient: &RecipientId, body: &str) -> Result<(), ClientError> {
        self.ensure_connected()?;
        tracing::info!(%recipient, bytes = body.len(), "simulated delivery");
        Ok(())
    }

    async fn set_composing(&self, recipient: &RecipientId) -> Result<(), ClientError> {
        self.ensure_connected()?;
        tracing::debug!(%recipient, "simulated composing indicator on");
        Ok(())
    }

    async fn clear_composing(&self, recipient: &RecipientId) -> Result<(), ClientError> {
        self.ensure_connected()?;
        tracing::debug!(%recipient, "simulated composing indicator off");
        Ok(())
    }

    async fn export_session(&self) -> Result<SessionBlob, ClientError> {
        self.ensure_connected()?;
        Ok(Self::session_blob())
    }
}
