use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, header::CONTENT_TYPE},
    routing::put,
};
use tower_http::services::ServeDir;

use crate::{
    dao::{document_store::StorageMode, uploads::LOCAL_UPLOADS_ROUTE},
    dto::game::UploadResponse,
    error::AppError,
    services::game_service,
    state::SharedState,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Store a picture for one of the game's items. The request body is the raw image.
#[utoipa::path(
    put,
    path = "/games/{id}/images/{file_name}",
    tag = "uploads",
    params(
        ("id" = String, Path, description = "Game identifier"),
        ("file_name" = String, Path, description = "Name of the stored file")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Public URL of the image", body = UploadResponse),
        (status = 400, description = "Invalid file name or empty body"),
        (status = 403, description = "Upload not allowed"),
        (status = 502, description = "Upload failed")
    )
)]
pub async fn upload_image(
    State(state): State<SharedState>,
    Path((id, file_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();

    Ok(Json(
        game_service::upload_image(&state, &id, &file_name, content_type, body.to_vec()).await?,
    ))
}

/// Upload endpoint, plus static serving of stored images when they live on local disk.
pub fn router(state: &SharedState) -> Router<SharedState> {
    let router = Router::<SharedState>::new().route(
        "/games/{id}/images/{file_name}",
        put(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
    );

    match state.storage_mode() {
        StorageMode::Local => router.nest_service(
            LOCAL_UPLOADS_ROUTE,
            ServeDir::new(state.config().uploads_dir()),
        ),
        StorageMode::Remote => router,
    }
}
