pub mod features;
pub mod game;
pub mod game_store;
pub mod reducer;
pub mod sync;
pub mod views;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    sync::{RwLock, watch},
    time::Instant,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    dao::{document_store::StorageMode, uploads::ImageUploader},
    state::{
        features::FeatureFlags,
        game_store::{GameStore, active_game, create_new_game, remember_active_game},
        sync::SyncContext,
    },
};

pub type SharedState = Arc<AppState>;

/// Cached game handle and the last time a caller asked for it.
struct OpenGame {
    store: Arc<GameStore>,
    last_used: Instant,
}

impl OpenGame {
    fn new(store: Arc<GameStore>) -> Self {
        Self {
            store,
            last_used: Instant::now(),
        }
    }

    fn touch(&mut self) -> Arc<GameStore> {
        self.last_used = Instant::now();
        self.store.clone()
    }
}

/// Central application state: backend handles and the games opened so far.
pub struct AppState {
    config: AppConfig,
    sync: SyncContext,
    uploader: Arc<dyn ImageUploader>,
    features: FeatureFlags,
    games: DashMap<String, OpenGame>,
    active_game: RwLock<Option<String>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Must run inside the tokio runtime: the feature flags start syncing immediately.
    pub fn new(
        config: AppConfig,
        sync: SyncContext,
        uploader: Arc<dyn ImageUploader>,
    ) -> SharedState {
        let (degraded, _rx) = watch::channel(false);
        let features = FeatureFlags::open(&sync);
        Arc::new(Self {
            config,
            sync,
            uploader,
            features,
            games: DashMap::new(),
            active_game: RwLock::new(None),
            degraded,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sync(&self) -> &SyncContext {
        &self.sync
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.sync.mode()
    }

    pub fn uploader(&self) -> &Arc<dyn ImageUploader> {
        &self.uploader
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    /// Handle for game `id`, opening it on first use. The returned store may
    /// still be loading.
    pub fn open_game(&self, id: &str) -> Arc<GameStore> {
        self.games
            .entry(id.to_string())
            .or_insert_with(|| {
                OpenGame::new(Arc::new(GameStore::open(
                    &self.sync,
                    id,
                    self.config.game_expiry(),
                )))
            })
            .touch()
    }

    /// Already opened game, without touching the backend.
    pub fn cached_game(&self, id: &str) -> Option<Arc<GameStore>> {
        self.games.get_mut(id).map(|mut entry| entry.touch())
    }

    /// Create a new game, make it the active one and wait until it is ready.
    pub async fn create_game(&self) -> Arc<GameStore> {
        let store = Arc::new(create_new_game(&self.sync, self.config.game_expiry()).await);
        self.games
            .insert(store.id().to_string(), OpenGame::new(store.clone()));
        self.set_active_game(store.id()).await;
        info!(game = store.id(), "created game");
        store
    }

    /// Open an existing game, make it the active one and wait until it is loaded.
    pub async fn join_game(&self, id: &str) -> Arc<GameStore> {
        let store = self.open_game(id);
        store.wait_loaded().await;
        self.set_active_game(id).await;
        store
    }

    /// Re-open the game remembered from a previous run, if any.
    pub async fn restore_active_game(&self) -> Option<Arc<GameStore>> {
        let id = active_game(self.sync.preferences()).await?;
        info!(game = %id, "restoring last active game");
        Some(self.join_game(&id).await)
    }

    async fn set_active_game(&self, id: &str) {
        let mut guard = self.active_game.write().await;
        if guard.as_deref() == Some(id) {
            return;
        }
        *guard = Some(id.to_string());
        remember_active_game(self.sync.preferences(), id).await;
    }

    /// Wait until every open document has written its pending changes.
    pub async fn flush_all(&self) {
        let stores = self
            .games
            .iter()
            .map(|entry| entry.store.clone())
            .collect::<Vec<_>>();
        for store in stores {
            store.flush().await;
        }
    }

    /// Close games nobody used since `idle_game_timeout` before `now`.
    ///
    /// Games still held elsewhere (an open SSE stream, a running request) and
    /// the active game stay open. Writes already queued by a closed game are
    /// still delivered. Returns how many games were closed.
    pub async fn evict_idle_games(&self, now: Instant) -> usize {
        let active = self.active_game.read().await.clone();
        let timeout = self.config.idle_game_timeout;
        let before = self.games.len();

        self.games.retain(|id, open| {
            let idle = now.saturating_duration_since(open.last_used) >= timeout;
            let held = Arc::strong_count(&open.store) > 1;
            let keep = !idle || held || active.as_deref() == Some(id.as_str());
            if !keep {
                debug!(game = %id, "closing idle game");
            }
            keep
        });
        before.saturating_sub(self.games.len())
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
