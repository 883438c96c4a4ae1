use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod features;
pub mod game;
pub mod health;
pub mod uploads;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(features::router())
        .merge(game::router())
        .merge(uploads::router(&state));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
