use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Divi back-end.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::features::get_features,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::get_game_for_edit,
        crate::routes::game::game_events,
        crate::routes::game::add_item,
        crate::routes::game::update_item,
        crate::routes::game::delete_item,
        crate::routes::game::add_participant,
        crate::routes::game::remove_participant,
        crate::routes::game::is_name_taken,
        crate::routes::game::toggle_auto_skip,
        crate::routes::game::reorder_participants,
        crate::routes::game::shuffle_participants,
        crate::routes::game::start_game,
        crate::routes::game::pick_item,
        crate::routes::game::skip_turn,
        crate::routes::game::set_turn,
        crate::routes::uploads::upload_image,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::features::FeaturesResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::CreateGameResponse,
            crate::dto::game::GameView,
            crate::dto::game::AddItemRequest,
            crate::dto::game::AddItemResponse,
            crate::dto::game::UpdateItemRequest,
            crate::dto::game::AddParticipantRequest,
            crate::dto::game::NameTakenResponse,
            crate::dto::game::ReorderParticipantsRequest,
            crate::dto::game::PickItemRequest,
            crate::dto::game::SetTurnRequest,
            crate::dto::game::UploadResponse,
            crate::state::game::GameState,
            crate::state::game::Item,
            crate::state::game::Participant,
            crate::state::views::ExpiryCountdown,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "features", description = "Feature toggles"),
        (name = "games", description = "Game creation and viewing"),
        (name = "items", description = "Items participants can pick"),
        (name = "participants", description = "Participants and turn order"),
        (name = "flow", description = "Starting the game and taking turns"),
        (name = "uploads", description = "Item pictures"),
    )
)]
pub struct ApiDoc;
