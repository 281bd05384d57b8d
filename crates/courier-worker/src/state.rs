//! Application state shared across HTTP handlers.

use std::sync::Arc;

use courier_core::StatusRecord;
use courier_dispatch::MessageDispatcher;
use tokio::sync::watch;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<MessageDispatcher>,
    /// Last published status record; carries the pairing artifact while
    /// pairing is required.
    pub record: watch::Receiver<StatusRecord>,
}
