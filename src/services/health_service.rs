use tracing::{info, warn};

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the document backend and report whether it answered.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let mode = state.storage_mode();
    match state.sync().store().health_check().await {
        Ok(()) => {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
            }
            state.update_degraded(false);
        }
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            state.update_degraded(true);
        }
    }

    if state.is_degraded() {
        HealthResponse::degraded(mode)
    } else {
        HealthResponse::ok(mode)
    }
}
