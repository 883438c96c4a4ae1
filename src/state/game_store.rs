//! One open game: the synced game document plus every operation players and
//! organizers can run on it.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::{
    dao::document_store::{DocumentKey, local::LocalStorage},
    state::{
        game::{GAMES_COLLECTION, GameState, ItemUpdate, NewItem, generate_id, now_millis},
        reducer,
        sync::{SyncContext, SyncedDocument},
        views::GameViews,
    },
};

/// Preference entry remembering the game this instance last worked on.
pub const CURRENT_GAME_KEY: &str = "divi_current_game";

/// Handle over a single game document.
///
/// Every mutation is a reducer applied through [`SyncedDocument::update`];
/// the returned flag tells whether the game actually changed.
pub struct GameStore {
    id: String,
    document: SyncedDocument<GameState>,
}

impl GameStore {
    /// Start syncing game `id`, seeded with a fresh default game until the
    /// stored one is loaded.
    pub fn open(context: &SyncContext, id: &str, expiry: Duration) -> Self {
        let initial = GameState::new(id, now_millis(), expiry);
        Self {
            id: id.to_string(),
            document: context.open(game_key(id), initial),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&self) -> GameState {
        self.document.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.document.subscribe()
    }

    pub async fn wait_loaded(&self) {
        self.document.wait_loaded().await;
    }

    /// Write the current game as is, creating the document if needed.
    pub fn persist(&self) {
        self.document.set(self.document.get());
    }

    /// Wait for pending writes to reach the backend.
    pub async fn flush(&self) {
        self.document.flush().await;
    }

    /// Derived views, starting with the current game and then once per change.
    pub fn views(&self) -> impl Stream<Item = GameViews> + Send + 'static {
        WatchStream::new(self.subscribe()).map(|game| GameViews::compute(game, now_millis()))
    }

    pub fn is_user_participating(&self, player: &str) -> bool {
        self.document.get().participant(player).is_some()
    }

    /// Add an item and return the id generated for it.
    pub fn add_item(&self, item: NewItem) -> String {
        let id = generate_id();
        self.document
            .update(|game| reducer::add_item(game, id.clone(), item));
        id
    }

    pub fn update_item(&self, id: &str, updates: ItemUpdate) -> bool {
        self.document
            .update(|game| reducer::update_item(game, id, updates))
    }

    pub fn delete_item(&self, id: &str) -> bool {
        self.document.update(|game| reducer::delete_item(game, id))
    }

    pub fn add_participant(&self, name: &str, is_organizer: bool) -> bool {
        self.document.update(|game| {
            reducer::add_participant(game, name, is_organizer, &mut rand::rng())
        })
    }

    pub fn randomize_participants(&self) -> bool {
        self.document
            .update(|game| reducer::randomize_participants(game, &mut rand::rng()))
    }

    pub fn reorder_participants(&self, new_order: &[String]) -> bool {
        self.document
            .update(|game| reducer::reorder_participants(game, new_order))
    }

    pub fn remove_participant(&self, name: &str) -> bool {
        self.document
            .update(|game| reducer::remove_participant(game, name))
    }

    pub fn start_game(&self) -> bool {
        self.document.update(reducer::start_game)
    }

    pub fn pick_item(&self, participant_name: &str, item_id: &str) -> bool {
        let picked = self
            .document
            .update(|game| reducer::pick_item(game, participant_name, item_id));
        if !picked {
            debug!(game = %self.id, participant_name, item_id, "pick ignored");
        }
        picked
    }

    pub fn skip_turn(&self) -> bool {
        self.document.update(reducer::skip_turn)
    }

    pub fn toggle_auto_skip(&self, name: &str) -> bool {
        self.document
            .update(|game| reducer::toggle_auto_skip(game, name))
    }

    pub fn set_current_turn_index(&self, index: usize) -> bool {
        self.document
            .update(|game| reducer::set_current_turn_index(game, index))
    }
}

fn game_key(id: &str) -> DocumentKey {
    DocumentKey::new(GAMES_COLLECTION, id)
}

/// Whether a game document exists for `id`.
///
/// Answers `true` when the backend cannot be reached so a joining player is
/// not turned away by a transient failure.
pub async fn game_exists(context: &SyncContext, id: &str) -> bool {
    match context.store().get_document(&game_key(id)).await {
        Ok(found) => found.is_some(),
        Err(err) => {
            warn!(game = id, error = %err, "could not check game existence");
            true
        }
    }
}

/// Whether `name` is already used by a participant of game `id`.
///
/// Missing or unreadable games answer `false`.
pub async fn is_participant_name_taken(context: &SyncContext, id: &str, name: &str) -> bool {
    let raw = match context.store().get_document(&game_key(id)).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return false,
        Err(err) => {
            warn!(game = id, error = %err, "could not check participant name");
            return false;
        }
    };

    match serde_json::from_value::<GameState>(raw) {
        Ok(game) => game.participant(name).is_some(),
        Err(err) => {
            warn!(game = id, error = %err, "stored game is malformed");
            false
        }
    }
}

/// Public link players use to join game `id`.
pub fn shareable_link(public_base_url: &str, id: &str) -> String {
    format!("{}/game/{id}", public_base_url.trim_end_matches('/'))
}

pub async fn remember_active_game(preferences: &LocalStorage, id: &str) {
    if let Err(err) = preferences.set_item(CURRENT_GAME_KEY, id).await {
        warn!(game = id, error = %err, "failed to remember active game");
    }
}

/// Id of the last game opened by this instance, if any.
pub async fn active_game(preferences: &LocalStorage) -> Option<String> {
    match preferences.get_item(CURRENT_GAME_KEY).await {
        Ok(found) => found.filter(|id| !id.trim().is_empty()),
        Err(err) => {
            warn!(error = %err, "failed to read active game");
            None
        }
    }
}

/// Open a brand new game under a generated id and write its default state.
pub async fn create_new_game(context: &SyncContext, expiry: Duration) -> GameStore {
    let store = GameStore::open(context, &generate_id(), expiry);
    store.wait_loaded().await;
    store.persist();
    store
}
