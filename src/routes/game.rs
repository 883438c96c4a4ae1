use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{delete, get, patch, post, put},
};
use axum_valid::Valid;
use futures::Stream;
use tracing::info;

use crate::{
    dto::game::{
        AddItemRequest, AddItemResponse, AddParticipantRequest, CreateGameRequest,
        CreateGameResponse, GameView, NameTakenResponse, PickItemRequest, PlayerQuery,
        ReorderParticipantsRequest, SetTurnRequest, UpdateItemRequest,
    },
    error::AppError,
    services::{game_service, sse_service},
    state::{SharedState, game::GameState},
};

/// Game, item, participant and turn endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/edit", get(get_game_for_edit))
        .route("/games/{id}/events", get(game_events))
        .route("/games/{id}/items", post(add_item))
        .route(
            "/games/{id}/items/{item_id}",
            patch(update_item).delete(delete_item),
        )
        .route("/games/{id}/participants", post(add_participant))
        .route("/games/{id}/participants/order", put(reorder_participants))
        .route(
            "/games/{id}/participants/shuffle",
            post(shuffle_participants),
        )
        .route("/games/{id}/participants/{name}", delete(remove_participant))
        .route("/games/{id}/participants/{name}/taken", get(is_name_taken))
        .route(
            "/games/{id}/participants/{name}/auto-skip",
            post(toggle_auto_skip),
        )
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/picks", post(pick_item))
        .route("/games/{id}/skip", post(skip_turn))
        .route("/games/{id}/turn", put(set_turn))
}

/// Create a new game and make it the active one.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = CreateGameResponse),
        (status = 400, description = "Invalid organizer name")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    let created = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Game as seen by players, with its derived views.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier"), PlayerQuery),
    responses(
        (status = 200, description = "Game view", body = GameView),
        (status = 404, description = "Divi not found")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::get_game(&state, &id, query.player.as_deref()).await?,
    ))
}

/// Raw game document for the organizer's edit page.
#[utoipa::path(
    get,
    path = "/games/{id}/edit",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game document", body = GameState),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game_for_edit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameState>, AppError> {
    Ok(Json(game_service::get_game_for_edit(&state, &id).await?))
}

/// Stream the game view on every change.
#[utoipa::path(
    get,
    path = "/games/{id}/events",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier"), PlayerQuery),
    responses(
        (status = 200, description = "Game SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Divi not found")
    )
)]
pub async fn game_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<PlayerQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let store = game_service::stream_source(&state, &id).await?;
    info!(game = %id, player = ?query.player, "new game SSE connection");
    Ok(sse_service::game_stream(&state, store, query.player))
}

#[utoipa::path(
    post,
    path = "/games/{id}/items",
    tag = "items",
    params(("id" = String, Path, description = "Game identifier")),
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added", body = AddItemResponse),
        (status = 404, description = "Game not found")
    )
)]
pub async fn add_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AddItemRequest>>,
) -> Result<(StatusCode, Json<AddItemResponse>), AppError> {
    let added = game_service::add_item(&state, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// Edit the provided fields of an item.
#[utoipa::path(
    patch,
    path = "/games/{id}/items/{item_id}",
    tag = "items",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    request_body = UpdateItemRequest,
    responses((status = 200, description = "Game after the edit", body = GameView))
)]
pub async fn update_item(
    State(state): State<SharedState>,
    Path((id, item_id)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<UpdateItemRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::update_item(&state, &id, &item_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/games/{id}/items/{item_id}",
    tag = "items",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    responses((status = 200, description = "Game without the item", body = GameView))
)]
pub async fn delete_item(
    State(state): State<SharedState>,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::delete_item(&state, &id, &item_id).await?))
}

/// Join a game. Duplicate names are ignored.
#[utoipa::path(
    post,
    path = "/games/{id}/participants",
    tag = "participants",
    params(("id" = String, Path, description = "Game identifier")),
    request_body = AddParticipantRequest,
    responses((status = 200, description = "Game after joining", body = GameView))
)]
pub async fn add_participant(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AddParticipantRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::add_participant(&state, &id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/games/{id}/participants/{name}",
    tag = "participants",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("name" = String, Path, description = "Participant name")
    ),
    responses((status = 200, description = "Game without the participant", body = GameView))
)]
pub async fn remove_participant(
    State(state): State<SharedState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::remove_participant(&state, &id, &name).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/games/{id}/participants/{name}/taken",
    tag = "participants",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("name" = String, Path, description = "Participant name")
    ),
    responses((status = 200, description = "Whether the name is used", body = NameTakenResponse))
)]
pub async fn is_name_taken(
    State(state): State<SharedState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<NameTakenResponse>, AppError> {
    Ok(Json(game_service::is_name_taken(&state, &id, &name).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/participants/{name}/auto-skip",
    tag = "participants",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("name" = String, Path, description = "Participant name")
    ),
    responses((status = 200, description = "Game after toggling", body = GameView))
)]
pub async fn toggle_auto_skip(
    State(state): State<SharedState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::toggle_auto_skip(&state, &id, &name).await?,
    ))
}

/// Replace the turn order. Ignored unless the names match the participants exactly.
#[utoipa::path(
    put,
    path = "/games/{id}/participants/order",
    tag = "participants",
    params(("id" = String, Path, description = "Game identifier")),
    request_body = ReorderParticipantsRequest,
    responses((status = 200, description = "Game after reordering", body = GameView))
)]
pub async fn reorder_participants(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<ReorderParticipantsRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::reorder_participants(&state, &id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/participants/shuffle",
    tag = "participants",
    params(("id" = String, Path, description = "Game identifier")),
    responses((status = 200, description = "Game after shuffling", body = GameView))
)]
pub async fn shuffle_participants(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(
        game_service::shuffle_participants(&state, &id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "flow",
    params(("id" = String, Path, description = "Game identifier")),
    responses((status = 200, description = "Started game", body = GameView))
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::start_game(&state, &id).await?))
}

/// Pick an item. Out-of-turn picks leave the game unchanged.
#[utoipa::path(
    post,
    path = "/games/{id}/picks",
    tag = "flow",
    params(("id" = String, Path, description = "Game identifier")),
    request_body = PickItemRequest,
    responses((status = 200, description = "Game after the pick", body = GameView))
)]
pub async fn pick_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<PickItemRequest>>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::pick_item(&state, &id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/skip",
    tag = "flow",
    params(("id" = String, Path, description = "Game identifier")),
    responses((status = 200, description = "Game after skipping", body = GameView))
)]
pub async fn skip_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::skip_turn(&state, &id).await?))
}

#[utoipa::path(
    put,
    path = "/games/{id}/turn",
    tag = "flow",
    params(("id" = String, Path, description = "Game identifier")),
    request_body = SetTurnRequest,
    responses((status = 200, description = "Game with the new turn", body = GameView))
)]
pub async fn set_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<SetTurnRequest>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::set_turn(&state, &id, payload).await?))
}
