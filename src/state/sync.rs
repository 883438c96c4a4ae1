//! Reactive in-memory values bound to one backend document each.
//!
//! A [`SyncedDocument`] is the cached projection of a document: readers get
//! the last known value immediately, mutations land locally first and are
//! written back in call order by a per-document writer task, and remote
//! changes replace the local value as they arrive. Backend failures are
//! logged and swallowed; callers always proceed optimistically.
//!
//! The change feed also reports this process's own writes. An echo of a
//! write that a newer local value has already replaced is ignored, so a
//! late echo never rolls back updates still on their way to the backend.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::StreamExt;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, warn};

use crate::dao::document_store::{DocumentKey, DocumentStore, StorageMode, local::LocalStorage};

/// Loading delay applied in local mode before a document reports ready.
pub const DEFAULT_LOADING_DELAY: Duration = Duration::from_millis(100);
/// Own writes remembered while waiting for their echo.
const MAX_TRACKED_WRITES: usize = 64;

/// Values that can live in a [`SyncedDocument`].
pub trait SyncValue: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> SyncValue for T where T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Backend handles shared by every synced document of the process.
///
/// Built once by the entry point and handed to whatever opens documents.
#[derive(Clone)]
pub struct SyncContext {
    store: Arc<dyn DocumentStore>,
    mode: StorageMode,
    preferences: LocalStorage,
    loading_delay: Duration,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mode: StorageMode,
        preferences: LocalStorage,
        loading_delay: Duration,
    ) -> Self {
        Self {
            store,
            mode,
            preferences,
            loading_delay,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Process-local key/value entries, available whatever the document backend.
    pub fn preferences(&self) -> &LocalStorage {
        &self.preferences
    }

    /// Start syncing the document at `key`, seeded with `initial` until the
    /// backend answers.
    pub fn open<T: SyncValue>(&self, key: DocumentKey, initial: T) -> SyncedDocument<T> {
        SyncedDocument::open(self, key, initial)
    }
}

enum WriteCommand {
    Put(Value),
    Flush(oneshot::Sender<()>),
}

struct Shared<T> {
    value: watch::Sender<T>,
    loading: watch::Sender<bool>,
    /// Last value adopted from the backend followed by the local writes made
    /// since, oldest first.
    history: Mutex<VecDeque<T>>,
}

impl<T: SyncValue> Shared<T> {
    fn history(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember `value` and hand it to the writer task.
    fn queue_write(
        &self,
        writes: &mpsc::UnboundedSender<WriteCommand>,
        key: &DocumentKey,
        value: &T,
    ) {
        {
            let mut history = self.history();
            if history.len() == MAX_TRACKED_WRITES {
                history.pop_front();
            }
            history.push_back(value.clone());
        }

        match serde_json::to_value(value) {
            Ok(document) => {
                if writes.send(WriteCommand::Put(document)).is_err() {
                    warn!(document = %key, "document writer stopped; dropping write");
                }
            }
            Err(err) => warn!(document = %key, error = %err, "failed to encode document"),
        }
    }
}

/// In-memory value kept in sync with one backend document.
///
/// Dropping the handle stops listening for remote changes; writes already
/// queued are still delivered.
pub struct SyncedDocument<T> {
    key: DocumentKey,
    shared: Arc<Shared<T>>,
    writes: mpsc::UnboundedSender<WriteCommand>,
    sync_task: JoinHandle<()>,
}

impl<T: SyncValue> SyncedDocument<T> {
    fn open(context: &SyncContext, key: DocumentKey, initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        let (loading, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            value,
            loading,
            history: Mutex::new(VecDeque::new()),
        });

        let (writes, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(context.store.clone(), key.clone(), queue));

        let sync_task = tokio::spawn(run_sync(
            context.clone(),
            key.clone(),
            shared.clone(),
            writes.clone(),
        ));

        Self {
            key,
            shared,
            writes,
            sync_task,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Snapshot of the last known value.
    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.value.subscribe()
    }

    /// Resolve once the initial read finished (successfully or not).
    pub async fn wait_loaded(&self) {
        let mut loading = self.shared.loading.subscribe();
        let _ = loading.wait_for(|loading| !*loading).await;
    }

    /// Replace the value and write it, even when it did not change.
    pub fn set(&self, value: T) {
        self.shared.value.send_modify(|current| {
            self.shared.queue_write(&self.writes, &self.key, &value);
            *current = value;
        });
    }

    /// Apply `transform` to the last known value.
    ///
    /// Returns `false` when the transform produced an equal value; nothing is
    /// then notified or written.
    pub fn update<F>(&self, transform: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.shared.value.send_if_modified(|current| {
            let next = transform(current);
            if next == *current {
                return false;
            }
            self.shared.queue_write(&self.writes, &self.key, &next);
            *current = next;
            true
        })
    }

    /// Wait until every write queued before this call reached the backend.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writes.send(WriteCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

impl<T> Drop for SyncedDocument<T> {
    fn drop(&mut self) {
        self.sync_task.abort();
    }
}

/// Replace the local value with a backend one unless it is equal or stale.
///
/// An incoming value matching one of our own writes that a newer local write
/// followed is an old echo: the newer write is still on its way and its own
/// echo will follow.
fn adopt<T: SyncValue>(shared: &Shared<T>, key: &DocumentKey, raw: Value) {
    let incoming = match serde_json::from_value::<T>(raw) {
        Ok(incoming) => incoming,
        Err(err) => {
            warn!(document = %key, error = %err, "ignoring malformed document");
            return;
        }
    };

    shared.value.send_if_modified(|current| {
        let mut history = shared.history();
        let latest = history.len().saturating_sub(1);
        let superseded = history
            .iter()
            .rposition(|known| *known == incoming)
            .filter(|position| *position < latest);
        if let Some(position) = superseded {
            history.drain(..=position);
            debug!(document = %key, "ignoring echo of a superseded write");
            return false;
        }

        history.clear();
        history.push_back(incoming.clone());
        if *current == incoming {
            return false;
        }
        *current = incoming;
        true
    });
}

async fn run_sync<T: SyncValue>(
    context: SyncContext,
    key: DocumentKey,
    shared: Arc<Shared<T>>,
    writes: mpsc::UnboundedSender<WriteCommand>,
) {
    let changes = context.store.watch_document(&key);

    match context.store.get_document(&key).await {
        Ok(Some(raw)) => adopt(&shared, &key, raw),
        Ok(None) => match context.mode {
            StorageMode::Remote => {
                debug!(document = %key, "creating missing document");
                let current = shared.value.borrow().clone();
                shared.queue_write(&writes, &key, &current);
            }
            StorageMode::Local => {}
        },
        Err(err) => warn!(document = %key, error = %err, "failed to load document"),
    }

    if context.mode == StorageMode::Local {
        sleep(context.loading_delay).await;
    }
    shared.loading.send_replace(false);

    let Some(mut changes) = changes else {
        return;
    };
    while let Some(change) = changes.next().await {
        match change {
            Ok(raw) => adopt(&shared, &key, raw),
            Err(err) => warn!(document = %key, error = %err, "document change feed error"),
        }
    }
    debug!(document = %key, "document change feed ended");
}

/// Apply queued writes one at a time, in order.
///
/// Consecutive full-document writes are coalesced: only the newest needs to
/// reach the backend.
async fn run_writer(
    store: Arc<dyn DocumentStore>,
    key: DocumentKey,
    mut queue: mpsc::UnboundedReceiver<WriteCommand>,
) {
    let mut pending = queue.recv().await;
    while let Some(command) = pending.take() {
        match command {
            WriteCommand::Put(mut document) => {
                let mut next = None;
                while let Ok(queued) = queue.try_recv() {
                    match queued {
                        WriteCommand::Put(newer) => document = newer,
                        other => {
                            next = Some(other);
                            break;
                        }
                    }
                }

                if let Err(err) = store.put_document(&key, document).await {
                    warn!(document = %key, error = %err, "failed to write document");
                }

                pending = match next {
                    Some(command) => Some(command),
                    None => queue.recv().await,
                };
            }
            WriteCommand::Flush(ack) => {
                let _ = ack.send(());
                pending = queue.recv().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    use futures::{future::BoxFuture, stream::BoxStream};
    use serde::Deserialize;
    use serde_json::json;
    use tokio::{sync::broadcast, time::timeout};

    use super::*;
    use crate::{
        dao::{
            document_store::local::LocalDocumentStore,
            storage::{StorageError, StorageResult},
        },
        state::game::GameState,
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Entries {
        entries: Vec<String>,
    }

    fn push_entry(doc: &SyncedDocument<Entries>, entry: &str) {
        doc.update(|current| {
            let mut next = current.clone();
            next.entries.push(entry.to_string());
            next
        });
    }

    /// Remote-like backend living in memory.
    struct MemoryStore {
        documents: Mutex<HashMap<String, Value>>,
        puts: AtomicUsize,
        fail_reads: AtomicBool,
        changes: broadcast::Sender<(String, Value)>,
        /// When set, every write comes back on the change feed after this delay.
        echo_delay: Option<Duration>,
    }

    impl MemoryStore {
        fn new() -> Arc<Self> {
            Self::build(None)
        }

        fn with_echo(delay: Duration) -> Arc<Self> {
            Self::build(Some(delay))
        }

        fn build(echo_delay: Option<Duration>) -> Arc<Self> {
            let (changes, _) = broadcast::channel(16);
            Arc::new(Self {
                documents: Mutex::new(HashMap::new()),
                puts: AtomicUsize::new(0),
                fail_reads: AtomicBool::new(false),
                changes,
                echo_delay,
            })
        }

        fn stored(&self, key: &DocumentKey) -> Option<Value> {
            self.documents.lock().unwrap().get(&key.to_string()).cloned()
        }

        fn insert(&self, key: &DocumentKey, value: Value) {
            self.documents
                .lock()
                .unwrap()
                .insert(key.to_string(), value);
        }

        /// Simulate another client writing the document.
        fn push_remote(&self, key: &DocumentKey, value: Value) {
            self.insert(key, value.clone());
            let _ = self.changes.send((key.to_string(), value));
        }
    }

    impl DocumentStore for MemoryStore {
        fn get_document(
            &self,
            key: &DocumentKey,
        ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
            let result = if self.fail_reads.load(Ordering::SeqCst) {
                Err(StorageError::unavailable(
                    "offline".into(),
                    std::io::Error::other("offline"),
                ))
            } else {
                Ok(self.stored(key))
            };
            Box::pin(async move { result })
        }

        fn put_document(
            &self,
            key: &DocumentKey,
            document: Value,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.insert(key, document.clone());
            if let Some(delay) = self.echo_delay {
                let changes = self.changes.clone();
                let id = key.to_string();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = changes.send((id, document));
                });
            }
            Box::pin(async { Ok(()) })
        }

        fn watch_document(
            &self,
            key: &DocumentKey,
        ) -> Option<BoxStream<'static, StorageResult<Value>>> {
            let mut changes = self.changes.subscribe();
            let wanted = key.to_string();
            Some(Box::pin(async_stream::stream! {
                while let Ok((id, value)) = changes.recv().await {
                    if id == wanted {
                        yield Ok(value);
                    }
                }
            }))
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    async fn remote_context(store: Arc<MemoryStore>, dir: &tempfile::TempDir) -> SyncContext {
        let preferences = LocalStorage::open(dir.path()).await.unwrap();
        SyncContext::new(store, StorageMode::Remote, preferences, Duration::ZERO)
    }

    async fn local_context(dir: &tempfile::TempDir) -> SyncContext {
        let storage = LocalStorage::open(dir.path()).await.unwrap();
        let store = LocalDocumentStore::new(storage.clone(), "divi");
        SyncContext::new(
            Arc::new(store),
            StorageMode::Local,
            storage,
            Duration::from_millis(10),
        )
    }

    async fn next_value<T: SyncValue>(rx: &mut watch::Receiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no change within timeout")
            .unwrap();
        rx.borrow_and_update().clone()
    }

    #[tokio::test]
    async fn remote_missing_document_is_created_from_initial_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let context = remote_context(store.clone(), &dir).await;
        let key = DocumentKey::new("features", "donations");

        let doc = context.open(key.clone(), Counter { count: 3 });
        doc.wait_loaded().await;
        doc.flush().await;

        assert_eq!(store.stored(&key), Some(json!({ "count": 3 })));
        assert!(!*doc.shared.loading.borrow());
    }

    #[tokio::test]
    async fn remote_existing_document_replaces_initial_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let key = DocumentKey::new("features", "donations");
        store.insert(&key, json!({ "count": 9 }));
        let context = remote_context(store.clone(), &dir).await;

        let doc = context.open(key, Counter { count: 0 });
        doc.wait_loaded().await;

        assert_eq!(doc.get(), Counter { count: 9 });
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn loading_ends_even_when_the_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.fail_reads.store(true, Ordering::SeqCst);
        let context = remote_context(store, &dir).await;

        let doc = context.open(DocumentKey::new("games", "g1"), Counter { count: 1 });
        timeout(Duration::from_secs(2), doc.wait_loaded())
            .await
            .unwrap();

        assert_eq!(doc.get(), Counter { count: 1 });
    }

    #[tokio::test]
    async fn remote_changes_are_adopted_and_malformed_ones_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "count": 1 }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key.clone(), Counter { count: 0 });
        doc.wait_loaded().await;

        let mut rx = doc.subscribe();
        rx.borrow_and_update();
        store.push_remote(&key, json!({ "count": "many" }));
        store.push_remote(&key, json!({ "count": 1 }));
        store.push_remote(&key, json!({ "count": 5 }));

        assert_eq!(next_value(&mut rx).await, Counter { count: 5 });
    }

    #[tokio::test]
    async fn no_op_update_neither_notifies_nor_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "count": 2 }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key, Counter { count: 0 });
        doc.wait_loaded().await;

        let mut rx = doc.subscribe();
        rx.borrow_and_update();
        assert!(!doc.update(|current| current.clone()));
        doc.flush().await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn updates_are_written_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "count": 0 }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key.clone(), Counter { count: 0 });
        doc.wait_loaded().await;

        for _ in 0..50 {
            doc.update(|current| Counter {
                count: current.count + 1,
            });
        }
        doc.flush().await;

        assert_eq!(doc.get(), Counter { count: 50 });
        assert_eq!(store.stored(&key), Some(json!({ "count": 50 })));
    }

    #[tokio::test]
    async fn set_writes_even_an_equal_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "count": 4 }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key, Counter { count: 0 });
        doc.wait_loaded().await;

        doc.set(Counter { count: 4 });
        doc.flush().await;

        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn local_mode_writes_nothing_until_first_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let context = local_context(&dir).await;
        let key = DocumentKey::new("games", "g1");

        let doc = context.open(key.clone(), Counter { count: 0 });
        assert!(*doc.shared.loading.borrow());
        doc.wait_loaded().await;
        doc.flush().await;
        assert!(context.preferences().get_item("divi_games_g1").await.unwrap().is_none());

        doc.update(|current| Counter {
            count: current.count + 7,
        });
        doc.flush().await;
        drop(doc);

        let reopened = context.open(key, Counter { count: 0 });
        reopened.wait_loaded().await;
        assert_eq!(reopened.get(), Counter { count: 7 });
    }

    #[tokio::test]
    async fn game_state_round_trips_through_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let context = local_context(&dir).await;
        let key = DocumentKey::new("games", "g1");

        let mut game = GameState::new("g1", 42, Duration::from_secs(60));
        game.items.push(crate::state::game::Item {
            id: "i1".into(),
            name: "Scarf".into(),
            description: None,
            picked_by: None,
            image_url: Some("https://img/scarf.png".into()),
        });

        let doc = context.open(key.clone(), GameState::new("g1", 0, Duration::ZERO));
        doc.wait_loaded().await;
        doc.set(game.clone());
        doc.flush().await;
        drop(doc);

        let reopened = context.open(key, GameState::new("g1", 0, Duration::ZERO));
        reopened.wait_loaded().await;
        assert_eq!(reopened.get(), game);
    }

    #[tokio::test(start_paused = true)]
    async fn late_echo_of_an_older_write_keeps_newer_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with_echo(Duration::from_millis(50));
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "entries": [] }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key.clone(), Entries::default());
        doc.wait_loaded().await;

        push_entry(&doc, "a");
        sleep(Duration::from_millis(10)).await;
        push_entry(&doc, "b");
        // the echo of "a" arrives here, after "b" was applied locally
        sleep(Duration::from_millis(45)).await;
        assert_eq!(doc.get().entries, ["a", "b"]);

        push_entry(&doc, "c");
        sleep(Duration::from_millis(200)).await;
        doc.flush().await;

        assert_eq!(doc.get().entries, ["a", "b", "c"]);
        assert_eq!(store.stored(&key), Some(json!({ "entries": ["a", "b", "c"] })));
    }

    #[tokio::test(start_paused = true)]
    async fn other_writers_are_still_adopted_after_own_echoes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with_echo(Duration::from_millis(20));
        let key = DocumentKey::new("games", "g1");
        store.insert(&key, json!({ "entries": [] }));
        let context = remote_context(store.clone(), &dir).await;
        let doc = context.open(key.clone(), Entries::default());
        doc.wait_loaded().await;

        push_entry(&doc, "mine");
        sleep(Duration::from_millis(50)).await;
        store.push_remote(&key, json!({ "entries": ["theirs"] }));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(doc.get().entries, ["theirs"]);
    }

    #[tokio::test]
    async fn game_state_round_trips_through_the_remote_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let context = remote_context(store.clone(), &dir).await;
        let key = DocumentKey::new("games", "g1");

        let mut game = GameState::new("g1", 42, Duration::from_secs(60));
        game.items.push(crate::state::game::Item {
            id: "i1".into(),
            name: "Scarf".into(),
            description: None,
            picked_by: Some("Ada".into()),
            image_url: None,
        });

        let doc = context.open(key.clone(), GameState::new("g1", 0, Duration::ZERO));
        doc.wait_loaded().await;
        doc.set(game.clone());
        doc.flush().await;
        drop(doc);

        let stored = store.stored(&key).unwrap();
        assert!(stored["items"][0].get("description").is_none());
        assert_eq!(stored["items"][0]["pickedBy"], json!("Ada"));

        let reopened = context.open(key, GameState::new("g1", 0, Duration::ZERO));
        reopened.wait_loaded().await;
        assert_eq!(reopened.get(), game);
    }
}
