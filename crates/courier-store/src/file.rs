//! File-backed session store and status publisher.
//!
//! Each document is a single JSON file under the worker's data directory.
//! Writes go through a temp file plus rename so observers never read a
//! half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courier_core::{SessionBlob, SessionStore, StatusPublisher, StatusRecord, StoreError};

const SESSION_FILE: &str = "session.json";
const STATUS_FILE: &str = "status.json";

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Single-slot session store persisted as `<dir>/session.json`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE),
        }
    }

    /// Startup connectivity check: verify the backing directory exists and
    /// is writable. A failure here is fatal to the worker, unlike runtime
    /// store errors which are logged and retried.
    ///
    /// # Errors
    /// Returns `StoreError::Io` when the directory cannot be created or
    /// written to.
    pub async fn probe(&self) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| StoreError::Backend("store path has no parent".into()))?;
        tokio::fs::create_dir_all(dir).await?;

        let marker = dir.join(".probe");
        tokio::fs::write(&marker, b"ok").await?;
        tokio::fs::remove_file(&marker).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn save(&self, blob: &SessionBlob) -> Result<(), StoreError> {
        tracing::debug!(path = %self.path.display(), "saving session blob");
        let bytes =
            serde_json::to_vec(blob).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &bytes).await
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn extract(&self) -> Result<Option<SessionBlob>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(blob))
    }

    async fn delete(&self) -> Result<(), StoreError> {
        tracing::debug!(path = %self.path.display(), "deleting session blob");
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Status publisher persisted as `<dir>/status.json`.
pub struct FileStatusPublisher {
    path: PathBuf,
}

impl FileStatusPublisher {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STATUS_FILE),
        }
    }

    /// Read back the last published record, if any.
    ///
    /// # Errors
    /// Returns `StoreError::Corrupt` when the document cannot be parsed.
    pub async fn read(&self) -> Result<Option<StatusRecord>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(record))
    }
}

#[async_trait]
impl StatusPublisher for FileStatusPublisher {
    async fn publish(&self, record: &StatusRecord) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ConnectionStatus;

    fn blob(tag: &str) -> SessionBlob {
        SessionBlob::new(serde_json::json!({ "tag": tag }))
    }

    #[tokio::test]
    async fn round_trip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path());
            store.save(&blob("persisted")).await.unwrap();
        }

        let reopened = FileStore::new(dir.path());
        assert!(reopened.exists().await.unwrap());
        assert_eq!(reopened.extract().await.unwrap(), Some(blob("persisted")));
    }

    #[tokio::test]
    async fn missing_file_is_absence_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(!store.exists().await.unwrap());
        assert_eq!(store.extract().await.unwrap(), None);
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save(&blob("a")).await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        tokio::fs::write(dir.path().join("session.json"), b"not json {")
            .await
            .unwrap();

        match store.extract().await {
            Err(StoreError::Corrupt(_)) => {}
            other => panic!("expected Corrupt error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_creates_directory_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");
        let store = FileStore::new(&nested);
        store.probe().await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn publisher_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FileStatusPublisher::new(dir.path());

        publisher
            .publish(&StatusRecord::with_artifact(
                ConnectionStatus::PairingRequired,
                "data:text/plain,code",
            ))
            .await
            .unwrap();
        publisher
            .publish(&StatusRecord::new(ConnectionStatus::Connected))
            .await
            .unwrap();

        let record = publisher.read().await.unwrap().unwrap();
        assert_eq!(record.status, ConnectionStatus::Connected);
        // The artifact from the earlier record must not linger.
        assert!(record.qr_code_url.is_none());
    }
}
