//! In-memory session store and status publisher.

use std::sync::RwLock;

use async_trait::async_trait;
use courier_core::{SessionBlob, SessionStore, StatusPublisher, StatusRecord, StoreError};

/// In-memory single-slot session store.
///
/// Useful for development and tests. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    slot: RwLock<Option<SessionBlob>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, blob: &SessionBlob) -> Result<(), StoreError> {
        tracing::debug!("saving session blob");
        *self
            .slot
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))? = Some(blob.clone());
        Ok(())
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(self
            .slot
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some())
    }

    async fn extract(&self) -> Result<Option<SessionBlob>, StoreError> {
        Ok(self
            .slot
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .clone())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        tracing::debug!("deleting session blob");
        *self
            .slot
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))? = None;
        Ok(())
    }
}

/// In-memory status publisher that keeps the full publish history.
///
/// The history makes transition-ordering assertions possible in tests;
/// external observers only care about [`MemoryStatusPublisher::last`].
#[derive(Default)]
pub struct MemoryStatusPublisher {
    records: RwLock<Vec<StatusRecord>>,
}

impl MemoryStatusPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published record, if any.
    #[must_use]
    pub fn last(&self) -> Option<StatusRecord> {
        self.records.read().ok()?.last().cloned()
    }

    /// Every record published so far, in publish order.
    #[must_use]
    pub fn history(&self) -> Vec<StatusRecord> {
        self.records
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatusPublisher for MemoryStatusPublisher {
    async fn publish(&self, record: &StatusRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}
