//! Message dispatcher: validates, gates and paces outbound sends.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{ClientError, ConnectionStatus, NetworkClient, OutboundMessage, RecipientId};
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Dispatch tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Domain suffix appended to normalized recipients, e.g. `c.us`.
    pub domain_suffix: String,
    /// Lower bound of the randomized pacing delay.
    pub min_delay: Duration,
    /// Upper bound of the randomized pacing delay.
    pub max_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            domain_suffix: "c.us".into(),
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(4000),
        }
    }
}

/// Synchronous dispatch failure, surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("recipient is not registered on the network")]
    NotRegistered,
    #[error("connection is not ready")]
    ConnectionUnavailable,
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// Failure during the decoupled paced-send phase. Never surfaced to the
/// original caller; observable only through logs and the completion channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    #[error("transmit failed: {0}")]
    Transport(String),
    #[error("send queue shut down before transmission")]
    Canceled,
}

/// Acceptance acknowledgment for a queued send.
///
/// Acceptance is not delivery: the paced send runs later on the queue
/// worker. `completion` resolves once transmission finishes (or fails);
/// dropping it is fine for callers that only care about acceptance.
pub struct SendReceipt {
    pub message_id: Uuid,
    pub recipient: RecipientId,
    pub accepted_at: i64,
    pub completion: oneshot::Receiver<Result<(), SendError>>,
}

struct QueuedSend {
    message: OutboundMessage,
    done: oneshot::Sender<Result<(), SendError>>,
}

/// Validates and paces outbound sends against the live connection.
///
/// Accepted sends go through a single-consumer queue, so they are
/// transmitted in submission order; each waits a uniform random delay in
/// `[min_delay, max_delay]` behind a "composing" presence indicator before
/// the actual transmit.
pub struct MessageDispatcher {
    client: Arc<dyn NetworkClient>,
    status: watch::Receiver<ConnectionStatus>,
    config: DispatchConfig,
    queue: mpsc::Sender<QueuedSend>,
}

impl MessageDispatcher {
    /// Create the dispatcher and spawn its queue worker.
    #[must_use]
    pub fn new(
        client: Arc<dyn NetworkClient>,
        status: watch::Receiver<ConnectionStatus>,
        config: DispatchConfig,
    ) -> Self {
        let (queue, rx) = mpsc::channel(64);
        tokio::spawn(queue_worker(Arc::clone(&client), rx, config.clone()));
        Self {
            client,
            status,
            config,
            queue,
        }
    }

    /// Accept an outbound send.
    ///
    /// Returns as soon as the message passes validation and the
    /// registration check; the paced transmission happens later on the
    /// queue worker.
    ///
    /// # Errors
    /// `Validation` for malformed input, `ConnectionUnavailable` when the
    /// connection is not in the connected state, `NotRegistered` when the
    /// recipient is not a network participant, `Client` when the
    /// registration check itself fails.
    pub async fn send(&self, recipient_raw: &str, body: &str) -> Result<SendReceipt, DispatchError> {
        if recipient_raw.trim().is_empty() {
            return Err(DispatchError::Validation("recipient is required"));
        }
        if body.trim().is_empty() {
            return Err(DispatchError::Validation("message body is required"));
        }
        if *self.status.borrow() != ConnectionStatus::Connected {
            return Err(DispatchError::ConnectionUnavailable);
        }

        let recipient = RecipientId::normalize(recipient_raw, &self.config.domain_suffix)
            .ok_or(DispatchError::Validation("recipient contains no digits"))?;

        if !self.client.is_registered(&recipient).await? {
            tracing::warn!(%recipient, "send rejected, recipient not registered");
            return Err(DispatchError::NotRegistered);
        }

        let message = OutboundMessage::new(recipient.clone(), body.to_owned());
        let message_id = message.id;
        let accepted_at = message.accepted_at;

        let (done, completion) = oneshot::channel();
        self.queue
            .send(QueuedSend { message, done })
            .await
            .map_err(|_| DispatchError::ConnectionUnavailable)?;

        tracing::info!(%recipient, %message_id, "send accepted");
        Ok(SendReceipt {
            message_id,
            recipient,
            accepted_at,
            completion,
        })
    }
}

async fn queue_worker(
    client: Arc<dyn NetworkClient>,
    mut queue: mpsc::Receiver<QueuedSend>,
    config: DispatchConfig,
) {
    while let Some(QueuedSend { message, done }) = queue.recv().await {
        let result = paced_send(client.as_ref(), &message, &config).await;
        match &result {
            Ok(()) => tracing::info!(recipient = %message.recipient, id = %message.id, "message sent"),
            Err(e) => {
                tracing::error!(recipient = %message.recipient, id = %message.id, error = %e, "paced send failed");
            }
        }
        // The caller may have dropped the receipt; that loses nothing.
        let _ = done.send(result);
    }
    tracing::debug!("send queue closed");
}

async fn paced_send(
    client: &dyn NetworkClient,
    message: &OutboundMessage,
    config: &DispatchConfig,
) -> Result<(), SendError> {
    // A composing-indicator failure is cosmetic and must not abort the send.
    if let Err(e) = client.set_composing(&message.recipient).await {
        tracing::warn!(recipient = %message.recipient, error = %e, "composing indicator failed");
    }

    tokio::time::sleep(pacing_delay(config)).await;

    let sent = client
        .send_text(&message.recipient, &message.body)
        .await
        .map_err(|e| SendError::Transport(e.to_string()));

    if let Err(e) = client.clear_composing(&message.recipient).await {
        tracing::warn!(recipient = %message.recipient, error = %e, "clearing composing indicator failed");
    }

    sent
}

fn pacing_delay(config: &DispatchConfig) -> Duration {
    let lo = config.min_delay.as_millis() as u64;
    let hi = (config.max_delay.as_millis() as u64).max(lo);
    let millis = rand::thread_rng().gen_range(lo..=hi);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use courier_core::{SessionBlob, SessionStore};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        IsRegistered(String),
        Composing(String),
        Send(String, String),
        ClearComposing(String),
    }

    struct FakeClient {
        calls: Mutex<Vec<Call>>,
        registered: bool,
        fail_send: AtomicBool,
    }

    impl FakeClient {
        fn new(registered: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                registered,
                fail_send: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl NetworkClient for FakeClient {
        async fn initialize(&self, _store: Arc<dyn SessionStore>) -> Result<(), ClientError> {
            Ok(())
        }

        async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError> {
            self.record(Call::IsRegistered(recipient.to_string()));
            Ok(self.registered)
        }

        async fn send_text(&self, recipient: &RecipientId, body: &str) -> Result<(), ClientError> {
            self.record(Call::Send(recipient.to_string(), body.to_owned()));
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("send refused".into()));
            }
            Ok(())
        }

        async fn set_composing(&self, recipient: &RecipientId) -> Result<(), ClientError> {
            self.record(Call::Composing(recipient.to_string()));
            Ok(())
        }

        async fn clear_composing(&self, recipient: &RecipientId) -> Result<(), ClientError> {
            self.record(Call::ClearComposing(recipient.to_string()));
            Ok(())
        }

        async fn export_session(&self) -> Result<SessionBlob, ClientError> {
            Ok(SessionBlob::new(serde_json::Value::Null))
        }
    }

    fn connected() -> watch::Receiver<ConnectionStatus> {
        let (tx, rx) = watch::channel(ConnectionStatus::Connected);
        // borrow() keeps returning the last value after the sender is gone.
        drop(tx);
        rx
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            domain_suffix: "c.us".into(),
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(40),
        }
    }

    #[tokio::test]
    async fn rejects_empty_inputs_before_any_network_call() {
        let client = FakeClient::new(true);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            connected(),
            fast_config(),
        );

        assert!(matches!(
            dispatcher.send("", "hello").await,
            Err(DispatchError::Validation(_))
        ));
        assert!(matches!(
            dispatcher.send("5511999999999", "  ").await,
            Err(DispatchError::Validation(_))
        ));
        assert!(matches!(
            dispatcher.send("no digits here", "hello").await,
            Err(DispatchError::Validation(_))
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn unregistered_recipient_never_reaches_the_wire() {
        let client = FakeClient::new(false);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            connected(),
            fast_config(),
        );

        assert!(matches!(
            dispatcher.send("+55 11 99999-9999", "Hi").await,
            Err(DispatchError::NotRegistered)
        ));

        let calls = client.calls();
        assert_eq!(
            calls,
            vec![Call::IsRegistered("5511999999999@c.us".into())],
            "no composing or transmit call may happen"
        );
    }

    #[tokio::test]
    async fn refuses_sends_while_not_connected() {
        let client = FakeClient::new(true);
        let (tx, rx) = watch::channel(ConnectionStatus::Disconnected);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            rx,
            fast_config(),
        );

        assert!(matches!(
            dispatcher.send("5511999999999", "Hi").await,
            Err(DispatchError::ConnectionUnavailable)
        ));
        assert!(client.calls().is_empty());
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_send_respects_the_configured_window() {
        let client = FakeClient::new(true);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            connected(),
            fast_config(),
        );

        let started = tokio::time::Instant::now();
        let receipt = dispatcher.send("+55 11 99999-9999", "Hi").await.unwrap();
        assert_eq!(receipt.recipient.as_str(), "5511999999999@c.us");

        receipt.completion.await.unwrap().unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(20), "sent too early: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(40), "sent too late: {elapsed:?}");

        let calls = client.calls();
        assert_eq!(
            calls,
            vec![
                Call::IsRegistered("5511999999999@c.us".into()),
                Call::Composing("5511999999999@c.us".into()),
                Call::Send("5511999999999@c.us".into(), "Hi".into()),
                Call::ClearComposing("5511999999999@c.us".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queued_sends_complete_in_submission_order() {
        let client = FakeClient::new(true);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            connected(),
            fast_config(),
        );

        let first = dispatcher.send("111111111", "first").await.unwrap();
        let second = dispatcher.send("222222222", "second").await.unwrap();

        first.completion.await.unwrap().unwrap();
        second.completion.await.unwrap().unwrap();

        let sends: Vec<_> = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send(..)))
            .collect();
        assert_eq!(
            sends,
            vec![
                Call::Send("111111111@c.us".into(), "first".into()),
                Call::Send("222222222@c.us".into(), "second".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transmit_failure_reaches_only_the_completion_channel() {
        let client = FakeClient::new(true);
        client.fail_send.store(true, Ordering::SeqCst);
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&client) as Arc<dyn NetworkClient>,
            connected(),
            fast_config(),
        );

        // Acceptance still succeeds; the failure happens in the paced phase.
        let receipt = dispatcher.send("5511999999999", "Hi").await.unwrap();
        let outcome = receipt.completion.await.unwrap();
        assert!(matches!(outcome, Err(SendError::Transport(_))));

        // The presence indicator is still cleared after a failed transmit.
        assert!(client
            .calls()
            .contains(&Call::ClearComposing("5511999999999@c.us".into())));
    }
}
