use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use quiz_core::model::Snapshot;

/// Local cache key holding the serialized snapshot document.
pub const SNAPSHOT_KEY: &str = "quizmaster_snapshot";

/// Local cache key holding the last successful sync timestamp.
pub const LAST_SYNC_KEY: &str = "quizmaster_last_sync";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors surfaced by remote storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("version conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REMOTE DOCUMENT ───────────────────────────────────────────────────────────
//

/// Opaque optimistic-concurrency token handed out by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A remote read result: the decoded snapshot plus its version token.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub snapshot: Snapshot,
    pub token: VersionToken,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Synchronous key-to-JSON persistence. Always available, never fails:
/// implementations log and swallow their own I/O problems, so callers can
/// treat a write as done the moment it returns.
pub trait LocalCache: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any prior value.
    fn set(&self, key: &str, value: Value);
}

/// Asynchronous access to the single remote document of record.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the remote document.
    ///
    /// Returns `Ok(None)` when no document exists yet or when the stored
    /// payload fails to decode; a payload the adapter cannot make sense of is
    /// "no data", not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the store cannot be reached.
    async fn read(&self) -> Result<Option<RemoteDocument>, StorageError>;

    /// Conditionally replaces the remote document.
    ///
    /// `token` must be the token from the last read or write; a stale token
    /// is rejected with `StorageError::Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport failure or a rejected token.
    async fn write(
        &self,
        snapshot: &Snapshot,
        token: Option<&VersionToken>,
    ) -> Result<VersionToken, StorageError>;
}

//
// ─── IN-MEMORY REMOTE ──────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct RemoteState {
    snapshot: Option<Snapshot>,
    revision: u64,
    offline: bool,
}

/// In-memory `RemoteStore` with token-checked writes and an offline switch,
/// for tests and offline development.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read and write fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Replaces the stored document out-of-band, as another device would.
    pub fn put_snapshot(&self, snapshot: Snapshot) {
        let mut state = self.lock();
        state.snapshot = Some(snapshot);
        state.revision += 1;
    }

    /// The stored document, bypassing the offline switch.
    #[must_use]
    pub fn stored(&self) -> Option<Snapshot> {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn read(&self) -> Result<Option<RemoteDocument>, StorageError> {
        let state = self.lock();
        if state.offline {
            return Err(StorageError::Connection("remote unavailable".into()));
        }
        Ok(state.snapshot.clone().map(|snapshot| RemoteDocument {
            snapshot,
            token: VersionToken::new(state.revision.to_string()),
        }))
    }

    async fn write(
        &self,
        snapshot: &Snapshot,
        token: Option<&VersionToken>,
    ) -> Result<VersionToken, StorageError> {
        let mut state = self.lock();
        if state.offline {
            return Err(StorageError::Connection("remote unavailable".into()));
        }
        if state.snapshot.is_some() {
            let current = state.revision.to_string();
            match token {
                Some(token) if token.as_str() == current => {}
                _ => return Err(StorageError::Conflict),
            }
        }
        state.snapshot = Some(snapshot.clone());
        state.revision += 1;
        Ok(VersionToken::new(state.revision.to_string()))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    #[tokio::test]
    async fn empty_remote_reads_none() {
        let remote = InMemoryRemote::new();
        assert!(remote.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let remote = InMemoryRemote::new();
        let mut snapshot = Snapshot::starter();
        snapshot.touch(fixed_now());

        let token = remote.write(&snapshot, None).await.unwrap();
        let doc = remote.read().await.unwrap().unwrap();
        assert_eq!(doc.snapshot, snapshot);
        assert_eq!(doc.token, token);
    }

    #[tokio::test]
    async fn stale_token_is_rejected() {
        let remote = InMemoryRemote::new();
        let snapshot = Snapshot::starter();

        let first = remote.write(&snapshot, None).await.unwrap();
        remote.put_snapshot(Snapshot::new());

        let err = remote.write(&snapshot, Some(&first)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        // A fresh read supplies a usable token again.
        let doc = remote.read().await.unwrap().unwrap();
        remote.write(&snapshot, Some(&doc.token)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_token_conflicts_once_a_document_exists() {
        let remote = InMemoryRemote::new();
        remote.put_snapshot(Snapshot::starter());

        let err = remote.write(&Snapshot::new(), None).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn offline_switch_fails_both_directions() {
        let remote = InMemoryRemote::new();
        remote.set_offline(true);

        assert!(matches!(
            remote.read().await.unwrap_err(),
            StorageError::Connection(_)
        ));
        assert!(matches!(
            remote.write(&Snapshot::new(), None).await.unwrap_err(),
            StorageError::Connection(_)
        ));

        remote.set_offline(false);
        assert!(remote.read().await.is_ok());
    }
}
