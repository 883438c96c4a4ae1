use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::features::FeaturesResponse, state::SharedState};

#[utoipa::path(
    get,
    path = "/features",
    tag = "features",
    responses((status = 200, description = "Current feature toggles", body = FeaturesResponse))
)]
/// Return the feature toggles as last synced from storage.
pub async fn get_features(State(state): State<SharedState>) -> Json<FeaturesResponse> {
    Json(state.features().current().into())
}

/// Configure the feature routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/features", get(get_features))
}
