//! Read-only projections computed from a [`GameState`].

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{GameState, Item, Participant};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Time left before a game expires, never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExpiryCountdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl ExpiryCountdown {
    fn from_millis(remaining: i64) -> Self {
        let remaining = remaining.max(0);
        Self {
            days: remaining / DAY_MS,
            hours: (remaining % DAY_MS) / HOUR_MS,
            minutes: (remaining % HOUR_MS) / MINUTE_MS,
            seconds: (remaining % MINUTE_MS) / SECOND_MS,
        }
    }

    pub fn is_expired(&self) -> bool {
        *self == Self::default()
    }
}

pub fn available_items(state: &GameState) -> Vec<Item> {
    state
        .items
        .iter()
        .filter(|item| !item.is_picked())
        .cloned()
        .collect()
}

pub fn picked_items(state: &GameState) -> Vec<Item> {
    state
        .items
        .iter()
        .filter(|item| item.is_picked())
        .cloned()
        .collect()
}

/// Participant whose pick is currently valid, if the index points at one.
pub fn current_turn(state: &GameState) -> Option<&Participant> {
    state.participants.get(state.current_turn_index)
}

/// A game is active while it is started, has players and still has something to pick.
pub fn is_game_active(state: &GameState) -> bool {
    state.started
        && !state.participants.is_empty()
        && state.items.iter().any(|item| !item.is_picked())
}

pub fn time_until_expiry(state: &GameState, now_ms: i64) -> ExpiryCountdown {
    ExpiryCountdown::from_millis(state.expiry_date.saturating_sub(now_ms))
}

pub fn is_current_players_turn(state: &GameState, player: Option<&str>) -> bool {
    match (current_turn(state), player) {
        (Some(current), Some(player)) => current.name == player,
        _ => false,
    }
}

/// All projections of one snapshot, recomputed together.
#[derive(Debug, Clone, PartialEq)]
pub struct GameViews {
    pub game: GameState,
    pub available_items: Vec<Item>,
    pub picked_items: Vec<Item>,
    pub current_turn: Option<Participant>,
    pub is_game_active: bool,
    pub time_until_expiry: ExpiryCountdown,
}

impl GameViews {
    pub fn compute(game: GameState, now_ms: i64) -> Self {
        Self {
            available_items: available_items(&game),
            picked_items: picked_items(&game),
            current_turn: current_turn(&game).cloned(),
            is_game_active: is_game_active(&game),
            time_until_expiry: time_until_expiry(&game, now_ms),
            game,
        }
    }

    pub fn is_current_players_turn(&self, player: Option<&str>) -> bool {
        is_current_players_turn(&self.game, player)
    }
}
