use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{format_millis, validation::validate_participant_name},
    state::{
        game::{Item, ItemUpdate, NewItem, Participant},
        views::{ExpiryCountdown, GameViews},
    },
};

/// Payload creating a new game, optionally seating its organizer right away.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 80),
        custom(function = "validate_participant_name")
    )]
    pub organizer_name: Option<String>,
}

/// Freshly created game and the link to share with players.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    pub id: String,
    pub shareable_link: String,
    pub game: GameView,
}

/// Optional identity of the caller, used to tell whether it is their turn.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlayerQuery {
    /// Name of the participant viewing the game.
    pub player: Option<String>,
}

/// Game as shown to players, with every derived projection precomputed.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: String,
    pub items: Vec<Item>,
    pub participants: Vec<Participant>,
    pub current_turn_index: usize,
    pub started: bool,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub expiry_date: String,
    pub available_items: Vec<Item>,
    pub picked_items: Vec<Item>,
    pub current_turn: Option<Participant>,
    pub is_game_active: bool,
    pub time_until_expiry: ExpiryCountdown,
    /// Present when the request named a player.
    pub is_my_turn: Option<bool>,
    pub shareable_link: String,
}

impl GameView {
    pub fn new(views: GameViews, player: Option<&str>, shareable_link: String) -> Self {
        let is_my_turn = player.map(|name| views.is_current_players_turn(Some(name)));
        let GameViews {
            game,
            available_items,
            picked_items,
            current_turn,
            is_game_active,
            time_until_expiry,
        } = views;

        Self {
            id: game.id,
            items: game.items,
            participants: game.participants,
            current_turn_index: game.current_turn_index,
            started: game.started,
            created_at: format_millis(game.created_at),
            expiry_date: format_millis(game.expiry_date),
            available_items,
            picked_items,
            current_turn,
            is_game_active,
            time_until_expiry,
            is_my_turn,
            shareable_link,
        }
    }
}

/// New item added by the organizer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
}

impl From<AddItemRequest> for NewItem {
    fn from(value: AddItemRequest) -> Self {
        Self {
            name: value.name,
            description: value.description,
            image_url: value.image_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddItemResponse {
    /// Generated identifier of the new item.
    pub id: String,
    pub game: GameView,
}

/// Partial item edit; omitted fields keep their value.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub picked_by: Option<String>,
}

impl From<UpdateItemRequest> for ItemUpdate {
    fn from(value: UpdateItemRequest) -> Self {
        Self {
            name: value.name,
            description: value.description,
            image_url: value.image_url,
            picked_by: value.picked_by,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantRequest {
    #[validate(
        length(min = 1, max = 80),
        custom(function = "validate_participant_name")
    )]
    pub name: String,
    #[serde(default)]
    pub is_organizer: bool,
}

/// Whether a participant name is already used in a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct NameTakenResponse {
    pub taken: bool,
}

/// Complete turn order, as participant names.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReorderParticipantsRequest {
    #[validate(length(min = 1))]
    pub order: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PickItemRequest {
    #[validate(length(min = 1))]
    pub participant_name: String,
    #[validate(length(min = 1))]
    pub item_id: String,
}

/// Overwrite of the turn pointer. Not checked against the participant count.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTurnRequest {
    pub index: usize,
}

/// Public location of an uploaded image.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}
