use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

/// Collection holding one document per game.
pub const GAMES_COLLECTION: &str = "games";
/// Default lifetime of a game, counted from its creation.
pub const DEFAULT_EXPIRY_DAYS: u64 = 30;

/// Something participants can pick.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Name of the participant who picked the item, set once.
    pub picked_by: Option<String>,
    pub image_url: Option<String>,
}

impl Item {
    pub fn is_picked(&self) -> bool {
        self.picked_by.is_some()
    }
}

/// A named player. The name is the identity key inside a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    /// Ids of the items this participant picked, in picking order.
    #[serde(default)]
    pub items_picked: Vec<String>,
    #[serde(default)]
    pub is_organizer: bool,
    #[serde(default)]
    pub auto_skip: bool,
}

impl Participant {
    pub fn new(name: impl Into<String>, is_organizer: bool) -> Self {
        Self {
            name: name.into(),
            items_picked: Vec::new(),
            is_organizer,
            auto_skip: false,
        }
    }
}

/// The whole synced game document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: String,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Turn order.
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub current_turn_index: usize,
    #[serde(default)]
    pub started: bool,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
    /// Unix timestamp in milliseconds. Display only; nothing purges expired games.
    pub expiry_date: i64,
}

impl GameState {
    /// Fresh, empty game created at `now_ms` and expiring `expiry` later.
    pub fn new(id: impl Into<String>, now_ms: i64, expiry: Duration) -> Self {
        let expiry_ms = i64::try_from(expiry.as_millis()).unwrap_or(i64::MAX);
        Self {
            id: id.into(),
            items: Vec::new(),
            participants: Vec::new(),
            current_turn_index: 0,
            started: false,
            created_at: now_ms,
            expiry_date: now_ms.saturating_add(expiry_ms),
        }
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Organizer input for a new item; the id is generated by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Partial edit of an item; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub picked_by: Option<String>,
}

/// Identifier for games and items.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

pub fn expiry_after_days(days: u64) -> Duration {
    Duration::from_secs(days * 24 * 60 * 60)
}
