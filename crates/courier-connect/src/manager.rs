//! Connection manager: owns the one connection's lifecycle state machine.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    ClientEvent, ConnectionStatus, NetworkClient, PairingRenderer, SessionStore, StatusPublisher,
    StatusRecord,
};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::backoff::Backoff;

/// Tuning knobs for the connection lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// How often the live session is exported and backed up while connected.
    pub backup_interval: Duration,
    /// First reconnect delay after a disconnect or failed initialization.
    pub backoff_initial: Duration,
    /// Cap on the reconnect delay.
    pub backoff_max: Duration,
    /// Reconnect attempt ceiling; once exhausted the worker stays
    /// disconnected until restarted.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            backup_interval: Duration::from_secs(300),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            max_reconnect_attempts: 10,
        }
    }
}

enum Tick {
    Event(Option<ClientEvent>),
    Backup,
}

/// State machine for the worker's single network connection.
///
/// Constructed once at startup and driven by [`ConnectionManager::run`] on a
/// dedicated task. Lifecycle events are consumed one at a time from a single
/// ordered channel, so a re-initialization can never overlap another: the
/// loop itself is the in-flight guard.
pub struct ConnectionManager {
    client: Arc<dyn NetworkClient>,
    events: mpsc::Receiver<ClientEvent>,
    store: Arc<dyn SessionStore>,
    publisher: Arc<dyn StatusPublisher>,
    renderer: Arc<dyn PairingRenderer>,
    config: ConnectConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    record_tx: watch::Sender<StatusRecord>,
    backoff: Backoff,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        client: Arc<dyn NetworkClient>,
        events: mpsc::Receiver<ClientEvent>,
        store: Arc<dyn SessionStore>,
        publisher: Arc<dyn StatusPublisher>,
        renderer: Arc<dyn PairingRenderer>,
        config: ConnectConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Uninitialized);
        let (record_tx, _) = watch::channel(StatusRecord::new(ConnectionStatus::Uninitialized));
        let backoff = Backoff::new(
            config.backoff_initial,
            config.backoff_max,
            config.max_reconnect_attempts,
        );
        Self {
            client,
            events,
            store,
            publisher,
            renderer,
            config,
            status_tx,
            record_tx,
            backoff,
        }
    }

    /// Live view of the connection status, for the dispatcher and the HTTP
    /// surface.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Live view of the last published status record, including the pairing
    /// artifact while pairing is required. The HTTP surface serves this so
    /// an operator can fetch the artifact without reading the status store.
    #[must_use]
    pub fn record_watch(&self) -> watch::Receiver<StatusRecord> {
        self.record_tx.subscribe()
    }

    /// Drive the state machine until the client's event channel closes.
    pub async fn run(mut self) {
        self.start_episode().await;

        let mut backup = tokio::time::interval(self.config.backup_interval);
        backup.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let tick = tokio::select! {
                ev = self.events.recv() => Tick::Event(ev),
                _ = backup.tick() => Tick::Backup,
            };

            match tick {
                Tick::Event(Some(ev)) => self.handle_event(ev).await,
                Tick::Event(None) => {
                    tracing::info!("client event channel closed, stopping connection manager");
                    break;
                }
                Tick::Backup => {
                    if *self.status_tx.borrow() == ConnectionStatus::Connected {
                        self.backup_session().await;
                    }
                }
            }
        }
    }

    /// Begin an authentication episode, retrying failed initializations
    /// under the backoff policy.
    async fn start_episode(&mut self) {
        loop {
            self.set_status(ConnectionStatus::Authenticating, None).await;
            match self.client.initialize(Arc::clone(&self.store)).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::error!(error = %e, "client initialization failed");
                    match self.backoff.next_delay() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            tracing::error!(
                                attempts = self.backoff.attempts_used(),
                                "reconnect attempt ceiling reached, staying disconnected"
                            );
                            self.set_status(ConnectionStatus::Disconnected, None).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::PairingRequired { payload } => {
                let artifact = match self.renderer.render(&payload) {
                    Ok(artifact) => Some(artifact),
                    Err(e) => {
                        tracing::error!(error = %e, "pairing artifact rendering failed");
                        None
                    }
                };
                self.set_status(ConnectionStatus::PairingRequired, artifact)
                    .await;
                tracing::info!("pairing required, waiting for operator");
            }
            ClientEvent::Ready => {
                self.backoff.reset();
                self.set_status(ConnectionStatus::Connected, None).await;
                tracing::info!("client is ready and connected");
            }
            ClientEvent::SessionPersisted => {
                tracing::info!("client confirmed session persistence");
            }
            ClientEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "client disconnected");
                self.set_status(ConnectionStatus::Disconnected, None).await;
                match self.backoff.next_delay() {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        self.start_episode().await;
                    }
                    None => {
                        tracing::error!(
                            attempts = self.backoff.attempts_used(),
                            "reconnect attempt ceiling reached, staying disconnected"
                        );
                    }
                }
            }
        }
    }

    async fn backup_session(&self) {
        let blob = match self.client.export_session().await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(error = %e, "session export failed, skipping backup");
                return;
            }
        };
        match self.store.save(&blob).await {
            Ok(()) => tracing::debug!("session backed up"),
            Err(e) => tracing::error!(error = %e, "session backup failed"),
        }
    }

    async fn set_status(&self, status: ConnectionStatus, artifact: Option<String>) {
        self.status_tx.send_replace(status);

        let record = match artifact {
            Some(artifact) => StatusRecord::with_artifact(status, artifact),
            None => StatusRecord::new(status),
        };
        self.record_tx.send_replace(record.clone());
        if let Err(e) = self.publisher.publish(&record).await {
            // Runtime store failures are recoverable; the next transition
            // overwrites the record anyway.
            tracing::error!(error = %e, ?status, "status publish failed");
        }
        tracing::info!(?status, "connection status changed");
    }
}
