use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::document_store::StorageMode;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Backend holding the documents ("remote" or "local").
    pub storage: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(mode: StorageMode) -> Self {
        Self {
            status: "ok".to_string(),
            storage: mode.as_str().to_string(),
        }
    }

    /// Create a health response indicating the storage backend is unreachable.
    pub fn degraded(mode: StorageMode) -> Self {
        Self {
            status: "degraded".to_string(),
            storage: mode.as_str().to_string(),
        }
    }
}
