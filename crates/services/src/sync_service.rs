use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use quiz_core::Clock;
use quiz_core::model::{Snapshot, SnapshotDocument, SnapshotError};
use storage::repository::{
    LAST_SYNC_KEY, LocalCache, RemoteDocument, RemoteStore, SNAPSHOT_KEY, VersionToken,
};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Sync state surfaced to the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading,
    Syncing,
    Synced,
    Offline,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Loading => "loading",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Offline => "offline",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a background reconciliation pass did, so the caller knows whether to
/// re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Remote was strictly newer; the snapshot was replaced.
    Updated,
    /// Remote was older, equal, or absent; nothing changed.
    Unchanged,
    /// The poll did not run (offline or no remote configured).
    Skipped,
}

//
// ─── SYNC SERVICE ──────────────────────────────────────────────────────────────
//

/// The reconciliation engine.
///
/// Owns the snapshot and mediates every change to it: each mutation lands in
/// the local cache synchronously before the remote write is even attempted,
/// and remote content only ever replaces local state through the
/// last-writer-wins timestamp comparison. Whole-document replace is the only
/// conflict rule; two writers racing within one poll interval can silently
/// lose data, which is the accepted cost of this design.
pub struct SyncService {
    clock: Clock,
    cache: Arc<dyn LocalCache>,
    remote: Option<Arc<dyn RemoteStore>>,
    snapshot: Snapshot,
    last_synced: Option<DateTime<Utc>>,
    token: Option<VersionToken>,
    online: bool,
    status: SyncStatus,
}

impl SyncService {
    #[must_use]
    pub fn new(
        clock: Clock,
        cache: Arc<dyn LocalCache>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        Self {
            clock,
            cache,
            remote,
            snapshot: Snapshot::starter(),
            last_synced: None,
            token: None,
            online: true,
            status: SyncStatus::Idle,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    #[must_use]
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    #[must_use]
    pub fn online(&self) -> bool {
        self.online
    }

    /// Marks the device online or offline, as reported by the platform.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
        if !online {
            self.status = SyncStatus::Offline;
        }
    }

    // ── Operations ─────────────────────────────────────────────────────────

    /// Startup load: local cache first (never fails; an empty or undecodable
    /// cache yields the starter library), then one remote read. A remote
    /// document carrying a timestamp wins unconditionally on first load.
    pub async fn load(&mut self) {
        self.status = SyncStatus::Loading;
        self.read_cache();

        let Some(remote) = self.remote.clone() else {
            self.status = SyncStatus::Offline;
            return;
        };
        match remote.read().await {
            Ok(Some(doc)) if doc.snapshot.last_updated().is_some() => {
                self.adopt_remote(doc);
                self.status = SyncStatus::Synced;
            }
            Ok(Some(doc)) => {
                // No timestamp to trust, but the token is still good for
                // the next write.
                self.token = Some(doc.token);
                self.status = SyncStatus::Offline;
            }
            Ok(None) => {
                self.status = SyncStatus::Offline;
            }
            Err(err) => {
                warn!("remote load failed, staying on local data: {err}");
                self.status = SyncStatus::Offline;
            }
        }
    }

    /// Applies a pure transformation to the snapshot.
    ///
    /// On success the snapshot is stamped with the current time, written to
    /// the local cache, and then pushed to the remote store. Remote failure
    /// downgrades the status to `Error` but never rolls the mutation back;
    /// the next poll is the retry. A failed transformation changes nothing.
    ///
    /// # Errors
    ///
    /// Returns whatever `SnapshotError` the transformation produced.
    pub async fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, SnapshotError>,
    ) -> Result<T, SnapshotError> {
        let mut draft = self.snapshot.clone();
        let out = f(&mut draft)?;
        draft.touch(self.clock.now());
        self.snapshot = draft;

        // Local durability comes first; the remote attempt follows.
        self.persist_snapshot();
        self.push_remote().await;
        Ok(out)
    }

    /// Background reconciliation pass. Skipped entirely while the device is
    /// offline; otherwise reads the remote document and applies
    /// last-writer-wins: strictly newer remote content replaces the snapshot
    /// and the local cache, anything else is left untouched.
    pub async fn reconcile_poll(&mut self) -> PollOutcome {
        if !self.online {
            self.status = SyncStatus::Offline;
            return PollOutcome::Skipped;
        }
        let Some(remote) = self.remote.clone() else {
            self.status = SyncStatus::Offline;
            return PollOutcome::Skipped;
        };

        match remote.read().await {
            Err(err) => {
                debug!("background poll failed: {err}");
                self.status = SyncStatus::Offline;
                PollOutcome::Skipped
            }
            Ok(None) => PollOutcome::Unchanged,
            Ok(Some(doc)) => {
                self.token = Some(doc.token.clone());
                let newer = match (doc.snapshot.last_updated(), self.last_synced) {
                    (Some(remote_ts), Some(local_ts)) => remote_ts > local_ts,
                    _ => false,
                };
                if newer {
                    self.adopt_remote(doc);
                    self.status = SyncStatus::Synced;
                    PollOutcome::Updated
                } else {
                    self.status = SyncStatus::Synced;
                    PollOutcome::Unchanged
                }
            }
        }
    }

    /// Additively merges a backup snapshot into the live one, then persists
    /// and pushes like any other mutation.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept as a `Result` so callers treat it like the
    /// other mutations.
    pub async fn import_merge(&mut self, incoming: Snapshot) -> Result<(), SnapshotError> {
        self.mutate(|snapshot| {
            snapshot.merge(incoming);
            Ok(())
        })
        .await
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn read_cache(&mut self) {
        self.snapshot = self
            .cache
            .get(SNAPSHOT_KEY)
            .and_then(|value| serde_json::from_value::<SnapshotDocument>(value).ok())
            .and_then(|doc| doc.into_snapshot().ok())
            .unwrap_or_else(Snapshot::starter);
        self.last_synced = self
            .cache
            .get(LAST_SYNC_KEY)
            .and_then(|value| serde_json::from_value(value).ok());
    }

    fn adopt_remote(&mut self, doc: RemoteDocument) {
        self.last_synced = doc.snapshot.last_updated();
        self.token = Some(doc.token);
        self.snapshot = doc.snapshot;
        self.persist_snapshot();
        self.persist_last_sync();
    }

    fn persist_snapshot(&self) {
        match serde_json::to_value(self.snapshot.to_document()) {
            Ok(value) => self.cache.set(SNAPSHOT_KEY, value),
            Err(err) => warn!("snapshot failed to encode for the cache: {err}"),
        }
    }

    fn persist_last_sync(&self) {
        match serde_json::to_value(self.last_synced) {
            Ok(value) => self.cache.set(LAST_SYNC_KEY, value),
            Err(err) => warn!("sync timestamp failed to encode for the cache: {err}"),
        }
    }

    async fn push_remote(&mut self) {
        let Some(remote) = self.remote.clone() else {
            self.status = SyncStatus::Offline;
            return;
        };
        self.status = SyncStatus::Syncing;
        match remote.write(&self.snapshot, self.token.as_ref()).await {
            Ok(token) => {
                self.token = Some(token);
                self.last_synced = self.snapshot.last_updated();
                self.persist_last_sync();
                self.status = SyncStatus::Synced;
            }
            Err(err) => {
                warn!("remote write failed, local data kept: {err}");
                self.status = SyncStatus::Error;
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{AnswerOption, Deck, Question, UNCATEGORIZED};
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::cache::MemoryCache;
    use storage::repository::InMemoryRemote;

    fn build_deck(name: &str) -> Deck {
        let q = Question::new(
            "Q",
            vec![AnswerOption::new("a", "Yes"), AnswerOption::new("b", "No")],
            "a",
            None,
        )
        .unwrap();
        Deck::new(name, vec![q], fixed_now()).unwrap()
    }

    fn cached_snapshot(cache: &MemoryCache) -> Option<Snapshot> {
        cache
            .get(SNAPSHOT_KEY)
            .and_then(|value| serde_json::from_value::<SnapshotDocument>(value).ok())
            .and_then(|doc| doc.into_snapshot().ok())
    }

    fn serialized(snapshot: &Snapshot) -> String {
        serde_json::to_string(&snapshot.to_document()).unwrap()
    }

    #[tokio::test]
    async fn load_without_remote_yields_starter_offline() {
        let cache = Arc::new(MemoryCache::new());
        let mut sync = SyncService::new(fixed_clock(), cache, None);
        sync.load().await;

        assert_eq!(sync.status(), SyncStatus::Offline);
        assert_eq!(sync.snapshot().folders().len(), 5);
        assert!(sync.snapshot().folder(UNCATEGORIZED).is_some());
    }

    #[tokio::test]
    async fn remote_wins_unconditionally_on_first_load() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());

        // Local cache already holds newer-stamped data than the remote;
        // first load still takes the remote copy.
        let mut local = Snapshot::starter();
        local.create_folder("Local Only").unwrap();
        local.touch(fixed_now() + Duration::hours(1));
        cache.set(
            SNAPSHOT_KEY,
            serde_json::to_value(local.to_document()).unwrap(),
        );

        let mut remote_snapshot = Snapshot::starter();
        remote_snapshot.create_folder("From Remote").unwrap();
        remote_snapshot.touch(fixed_now());
        remote.put_snapshot(remote_snapshot);

        let mut sync = SyncService::new(fixed_clock(), cache.clone(), Some(remote));
        sync.load().await;

        assert_eq!(sync.status(), SyncStatus::Synced);
        assert!(sync.snapshot().folder("From Remote").is_some());
        assert!(sync.snapshot().folder("Local Only").is_none());
        assert_eq!(sync.last_synced(), Some(fixed_now()));
        // The adopted copy is persisted locally too.
        assert_eq!(cached_snapshot(&cache).unwrap(), *sync.snapshot());
    }

    #[tokio::test]
    async fn load_keeps_local_when_remote_unreachable() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        remote.set_offline(true);

        let mut local = Snapshot::starter();
        local.create_folder("Cached").unwrap();
        local.touch(fixed_now());
        cache.set(
            SNAPSHOT_KEY,
            serde_json::to_value(local.to_document()).unwrap(),
        );

        let mut sync = SyncService::new(fixed_clock(), cache, Some(remote));
        sync.load().await;

        assert_eq!(sync.status(), SyncStatus::Offline);
        assert!(sync.snapshot().folder("Cached").is_some());
    }

    #[tokio::test]
    async fn every_mutation_lands_in_the_cache() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache.clone(), Some(remote));
        sync.load().await;

        sync.mutate(|s| s.create_folder("Cardiology")).await.unwrap();
        assert_eq!(cached_snapshot(&cache).unwrap(), *sync.snapshot());

        sync.mutate(|s| s.add_deck("Cardiology", build_deck("Murmurs")))
            .await
            .unwrap();
        assert_eq!(cached_snapshot(&cache).unwrap(), *sync.snapshot());

        sync.mutate(|s| s.delete_deck("Cardiology", "Murmurs")).await.unwrap();
        assert_eq!(cached_snapshot(&cache).unwrap(), *sync.snapshot());
    }

    #[tokio::test]
    async fn remote_write_failure_keeps_local_mutation() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache.clone(), Some(remote.clone()));
        sync.load().await;

        remote.set_offline(true);
        sync.mutate(|s| s.create_folder("Offline Work")).await.unwrap();

        assert_eq!(sync.status(), SyncStatus::Error);
        assert!(sync.snapshot().folder("Offline Work").is_some());
        assert_eq!(cached_snapshot(&cache).unwrap(), *sync.snapshot());
        assert!(remote.stored().is_none());
    }

    #[tokio::test]
    async fn failed_transformation_changes_nothing() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache.clone(), Some(remote.clone()));
        sync.load().await;
        sync.mutate(|s| s.create_folder("Existing")).await.unwrap();

        let before = serialized(sync.snapshot());
        let err = sync.mutate(|s| s.create_folder("Existing")).await.unwrap_err();
        assert!(matches!(err, SnapshotError::FolderExists(_)));
        assert_eq!(serialized(sync.snapshot()), before);
    }

    #[tokio::test]
    async fn poll_with_older_or_equal_remote_is_byte_for_byte_noop() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache, Some(remote.clone()));
        sync.load().await;
        sync.mutate(|s| s.create_folder("Mine")).await.unwrap();

        // Equal timestamp: remote holds exactly what this device wrote.
        let before = serialized(sync.snapshot());
        assert_eq!(sync.reconcile_poll().await, PollOutcome::Unchanged);
        assert_eq!(serialized(sync.snapshot()), before);

        // Older timestamp: a stale copy never overwrites newer local state.
        let mut stale = Snapshot::starter();
        stale.touch(fixed_now() - Duration::hours(2));
        remote.put_snapshot(stale);
        assert_eq!(sync.reconcile_poll().await, PollOutcome::Unchanged);
        assert_eq!(serialized(sync.snapshot()), before);
        assert!(sync.snapshot().folder("Mine").is_some());
    }

    #[tokio::test]
    async fn poll_with_newer_remote_replaces_snapshot_and_cache() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache.clone(), Some(remote.clone()));
        sync.load().await;
        sync.mutate(|s| s.create_folder("Mine")).await.unwrap();

        let mut newer = Snapshot::starter();
        newer.create_folder("Theirs").unwrap();
        newer.set_font_scale(1.5);
        newer.touch(fixed_now() + Duration::minutes(5));
        remote.put_snapshot(newer.clone());

        assert_eq!(sync.reconcile_poll().await, PollOutcome::Updated);
        assert_eq!(*sync.snapshot(), newer);
        assert_eq!(cached_snapshot(&cache).unwrap(), newer);
        assert_eq!(sync.last_synced(), newer.last_updated());
    }

    #[tokio::test]
    async fn poll_is_skipped_while_offline() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemote::new());
        let mut sync = SyncService::new(fixed_clock(), cache, Some(remote.clone()));
        sync.load().await;

        sync.set_online(false);
        let mut newer = Snapshot::starter();
        newer.touch(fixed_now() + Duration::hours(1));
        remote.put_snapshot(newer);

        assert_eq!(sync.reconcile_poll().await, PollOutcome::Skipped);
        assert_eq!(sync.status(), SyncStatus::Offline);

        sync.set_online(true);
        assert_ne!(sync.reconcile_poll().await, PollOutcome::Skipped);
    }

    #[tokio::test]
    async fn import_merge_is_additive_and_idempotent() {
        let cache = Arc::new(MemoryCache::new());
        let mut sync = SyncService::new(fixed_clock(), cache, None);
        sync.load().await;

        let mut backup = Snapshot::new();
        backup.add_deck("Surgery", build_deck("Trauma")).unwrap();
        sync.import_merge(backup.clone()).await.unwrap();
        assert!(sync.snapshot().deck("Surgery", "Trauma").is_some());

        let before = serialized(sync.snapshot());
        sync.import_merge(backup).await.unwrap();
        assert_eq!(serialized(sync.snapshot()), before);
    }
}
