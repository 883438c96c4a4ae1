use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    dao::uploads::UploadPath,
    dto::{
        game::{
            AddItemRequest, AddItemResponse, AddParticipantRequest, CreateGameRequest,
            CreateGameResponse, GameView, NameTakenResponse, PickItemRequest,
            ReorderParticipantsRequest, SetTurnRequest, UpdateItemRequest, UploadResponse,
        },
        validation::{validate_file_name, validate_game_id},
    },
    error::ServiceError,
    state::{
        SharedState,
        game::{GameState, now_millis},
        game_store::{GameStore, game_exists, is_participant_name_taken, shareable_link},
        views::GameViews,
    },
};

/// Message returned when a player opens a game that does not exist.
pub const DIVI_NOT_FOUND: &str = "Divi not found";
/// Message returned when an organizer edits a game that does not exist.
pub const GAME_NOT_FOUND: &str = "Game not found";

/// Resolve an existing game, opening it when this process has not yet.
async fn find_game(
    state: &SharedState,
    id: &str,
    not_found: &str,
) -> Result<Arc<GameStore>, ServiceError> {
    if validate_game_id(id).is_err() {
        return Err(ServiceError::NotFound(not_found.into()));
    }
    if state.cached_game(id).is_none() && !game_exists(state.sync(), id).await {
        return Err(ServiceError::NotFound(not_found.into()));
    }
    Ok(state.join_game(id).await)
}

/// Project the current state of `store` for `player`.
pub fn game_view(state: &SharedState, store: &GameStore, player: Option<&str>) -> GameView {
    let views = GameViews::compute(store.snapshot(), now_millis());
    GameView::new(views, player, link(state, store.id()))
}

fn link(state: &SharedState, id: &str) -> String {
    shareable_link(&state.config().public_base_url, id)
}

/// Run one store operation against an existing game and return the resulting view.
async fn apply<F>(state: &SharedState, id: &str, operation: F) -> Result<GameView, ServiceError>
where
    F: FnOnce(&GameStore) -> bool,
{
    let store = find_game(state, id, GAME_NOT_FOUND).await?;
    if !operation(&*store) {
        debug!(game = id, "operation left the game unchanged");
    }
    Ok(game_view(state, &store, None))
}

/// Create a game and seat the organizer when a name was given.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<CreateGameResponse, ServiceError> {
    let store = state.create_game().await;
    if let Some(organizer) = request.organizer_name.as_deref() {
        store.add_participant(organizer, true);
    }
    info!(game = store.id(), "game ready to share");

    let game = game_view(state, &store, request.organizer_name.as_deref());
    Ok(CreateGameResponse {
        id: store.id().to_string(),
        shareable_link: link(state, store.id()),
        game,
    })
}

pub async fn get_game(
    state: &SharedState,
    id: &str,
    player: Option<&str>,
) -> Result<GameView, ServiceError> {
    let store = find_game(state, id, DIVI_NOT_FOUND).await?;
    Ok(game_view(state, &store, player))
}

/// Raw game document, as edited by the organizer.
pub async fn get_game_for_edit(state: &SharedState, id: &str) -> Result<GameState, ServiceError> {
    let store = find_game(state, id, GAME_NOT_FOUND).await?;
    Ok(store.snapshot())
}

/// Game handle for streaming; fails like [`get_game`] for unknown ids.
pub async fn stream_source(state: &SharedState, id: &str) -> Result<Arc<GameStore>, ServiceError> {
    find_game(state, id, DIVI_NOT_FOUND).await
}

pub async fn add_item(
    state: &SharedState,
    id: &str,
    request: AddItemRequest,
) -> Result<AddItemResponse, ServiceError> {
    let store = find_game(state, id, GAME_NOT_FOUND).await?;
    let item_id = store.add_item(request.into());
    Ok(AddItemResponse {
        id: item_id,
        game: game_view(state, &store, None),
    })
}

pub async fn update_item(
    state: &SharedState,
    id: &str,
    item_id: &str,
    request: UpdateItemRequest,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.update_item(item_id, request.into())).await
}

pub async fn delete_item(
    state: &SharedState,
    id: &str,
    item_id: &str,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.delete_item(item_id)).await
}

pub async fn add_participant(
    state: &SharedState,
    id: &str,
    request: AddParticipantRequest,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| {
        store.add_participant(&request.name, request.is_organizer)
    })
    .await
}

pub async fn remove_participant(
    state: &SharedState,
    id: &str,
    name: &str,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.remove_participant(name)).await
}

/// Whether `name` is already used in game `id`. Unknown games have no taken names.
pub async fn is_name_taken(
    state: &SharedState,
    id: &str,
    name: &str,
) -> Result<NameTakenResponse, ServiceError> {
    if validate_game_id(id).is_err() {
        return Err(ServiceError::NotFound(GAME_NOT_FOUND.into()));
    }
    let taken = match state.cached_game(id) {
        Some(store) => store.is_user_participating(name),
        None => is_participant_name_taken(state.sync(), id, name).await,
    };
    Ok(NameTakenResponse { taken })
}

pub async fn toggle_auto_skip(
    state: &SharedState,
    id: &str,
    name: &str,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.toggle_auto_skip(name)).await
}

pub async fn reorder_participants(
    state: &SharedState,
    id: &str,
    request: ReorderParticipantsRequest,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.reorder_participants(&request.order)).await
}

pub async fn shuffle_participants(state: &SharedState, id: &str) -> Result<GameView, ServiceError> {
    apply(state, id, GameStore::randomize_participants).await
}

pub async fn start_game(state: &SharedState, id: &str) -> Result<GameView, ServiceError> {
    apply(state, id, GameStore::start_game).await
}

/// Pick on behalf of `participantName`; out-of-turn picks leave the game unchanged.
pub async fn pick_item(
    state: &SharedState,
    id: &str,
    request: PickItemRequest,
) -> Result<GameView, ServiceError> {
    let store = find_game(state, id, GAME_NOT_FOUND).await?;
    store.pick_item(&request.participant_name, &request.item_id);
    Ok(game_view(state, &store, Some(&request.participant_name)))
}

pub async fn skip_turn(state: &SharedState, id: &str) -> Result<GameView, ServiceError> {
    apply(state, id, GameStore::skip_turn).await
}

pub async fn set_turn(
    state: &SharedState,
    id: &str,
    request: SetTurnRequest,
) -> Result<GameView, ServiceError> {
    apply(state, id, |store| store.set_current_turn_index(request.index)).await
}

/// Store an item picture in the game's folder and return its public URL.
pub async fn upload_image(
    state: &SharedState,
    id: &str,
    file_name: &str,
    content_type: String,
    bytes: Vec<u8>,
) -> Result<UploadResponse, ServiceError> {
    validate_file_name(file_name)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    if bytes.is_empty() {
        return Err(ServiceError::InvalidInput("image body is empty".into()));
    }
    let store = find_game(state, id, GAME_NOT_FOUND).await?;

    let size = bytes.len();
    let url = state
        .uploader()
        .upload(UploadPath::new(store.id(), file_name), content_type, bytes)
        .await?;
    info!(game = id, file_name, size, "image uploaded");
    Ok(UploadResponse { url })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            document_store::{
                StorageMode,
                local::{LocalDocumentStore, LocalStorage},
            },
            uploads::LocalImageUploader,
        },
        dto::game::PlayerQuery,
        state::{AppState, sync::SyncContext},
    };

    async fn state(dir: &tempfile::TempDir) -> SharedState {
        let storage = LocalStorage::open(dir.path()).await.unwrap();
        let sync = SyncContext::new(
            Arc::new(LocalDocumentStore::new(storage.clone(), "divi")),
            StorageMode::Local,
            storage,
            Duration::ZERO,
        );
        let uploader = Arc::new(LocalImageUploader::new(
            dir.path().join("uploads"),
            "http://localhost:8080",
        ));
        AppState::new(AppConfig::default(), sync, uploader)
    }

    #[tokio::test]
    async fn unknown_games_use_route_specific_messages() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let err = get_game(&state, "missing", None).await.unwrap_err();
        assert_eq!(err.to_string(), DIVI_NOT_FOUND);
        let err = get_game(&state, " ", None).await.unwrap_err();
        assert_eq!(err.to_string(), DIVI_NOT_FOUND);
        let err = get_game_for_edit(&state, "").await.unwrap_err();
        assert_eq!(err.to_string(), GAME_NOT_FOUND);
    }

    #[tokio::test]
    async fn organizer_is_seated_when_creating() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let created = create_game(
            &state,
            CreateGameRequest {
                organizer_name: Some("Ada".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(
            created.shareable_link,
            format!("http://localhost:8080/game/{}", created.id)
        );
        assert_eq!(created.game.is_my_turn, Some(true));
        let taken = is_name_taken(&state, &created.id, "Ada").await.unwrap();
        assert!(taken.taken);
    }

    #[tokio::test]
    async fn picks_follow_turn_order() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;
        let id = create_game(&state, CreateGameRequest::default())
            .await
            .unwrap()
            .id;

        for name in ["A", "B"] {
            add_participant(
                &state,
                &id,
                AddParticipantRequest {
                    name: name.into(),
                    is_organizer: false,
                },
            )
            .await
            .unwrap();
        }
        let item = add_item(
            &state,
            &id,
            AddItemRequest {
                name: "Mug".into(),
                description: None,
                image_url: None,
            },
        )
        .await
        .unwrap()
        .id;
        start_game(&state, &id).await.unwrap();

        let wrong = pick_item(
            &state,
            &id,
            PickItemRequest {
                participant_name: "B".into(),
                item_id: item.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(wrong.current_turn_index, 0);
        assert_eq!(wrong.is_my_turn, Some(false));

        let picked = pick_item(
            &state,
            &id,
            PickItemRequest {
                participant_name: "A".into(),
                item_id: item,
            },
        )
        .await
        .unwrap();
        assert_eq!(picked.current_turn_index, 1);
        assert_eq!(picked.picked_items.len(), 1);
        assert!(!picked.is_game_active);

        let query = PlayerQuery {
            player: Some("B".into()),
        };
        let view = get_game(&state, &id, query.player.as_deref()).await.unwrap();
        assert_eq!(view.is_my_turn, Some(true));
    }

    #[tokio::test]
    async fn upload_rejects_bad_file_names_and_stores_images() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;
        let id = create_game(&state, CreateGameRequest::default())
            .await
            .unwrap()
            .id;

        let err = upload_image(&state, &id, "../x.png", "image/png".into(), vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let uploaded = upload_image(&state, &id, "mug.png", "image/png".into(), vec![1, 2])
            .await
            .unwrap();
        assert_eq!(
            uploaded.url,
            format!("http://localhost:8080/uploads/{id}/mug.png")
        );
    }
}
