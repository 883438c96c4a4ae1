//! Storage backend selection at startup and health supervision afterwards.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{
        document_store::{
            DocumentStore, StorageMode,
            local::{LocalDocumentStore, LocalResult, LocalStorage},
        },
        uploads::{ImageUploader, LocalImageUploader},
    },
    state::{SharedState, sync::SyncContext},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Everything the application needs from its storage layer.
pub struct StorageBackend {
    pub sync: SyncContext,
    pub uploader: Arc<dyn ImageUploader>,
}

/// Pick the document backend: CouchDB when configured and reachable, local
/// files otherwise.
///
/// Only failing to open the local data directory is fatal.
pub async fn connect(config: &AppConfig) -> LocalResult<StorageBackend> {
    let preferences = LocalStorage::open(&config.data_dir).await?;

    #[cfg(feature = "couch-store")]
    if let Some(backend) = connect_remote(config, &preferences).await {
        return Ok(backend);
    }

    info!(data_dir = %config.data_dir.display(), "using local storage");
    let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(
        preferences.clone(),
        config.namespace.as_str(),
    ));
    let uploader = Arc::new(LocalImageUploader::new(
        config.uploads_dir(),
        &config.public_base_url,
    ));
    Ok(StorageBackend {
        sync: SyncContext::new(store, StorageMode::Local, preferences, config.loading_delay),
        uploader,
    })
}

#[cfg(feature = "couch-store")]
async fn connect_remote(config: &AppConfig, preferences: &LocalStorage) -> Option<StorageBackend> {
    use crate::dao::{
        document_store::couchdb::{CouchConfig, CouchDocumentStore},
        uploads::CouchImageUploader,
    };

    let couch_config = match CouchConfig::from_env() {
        Ok(couch_config) => couch_config,
        Err(err) => {
            info!(reason = %err, "remote storage not configured");
            return None;
        }
    };

    let store = retry_with_backoff(MAX_CONNECT_ATTEMPTS, || {
        CouchDocumentStore::connect(couch_config.clone())
    })
    .await?;
    info!(database = %couch_config.database, "connected to CouchDB");

    let uploader = Arc::new(CouchImageUploader::new(
        store.clone(),
        config.upload_timeout,
        config.upload_max_attempts,
    ));
    Some(StorageBackend {
        sync: SyncContext::new(
            Arc::new(store),
            StorageMode::Remote,
            preferences.clone(),
            config.loading_delay,
        ),
        uploader,
    })
}

/// Call `connect` until it succeeds, doubling the delay between attempts.
///
/// Gives up with `None` after `attempts` failures.
async fn retry_with_backoff<F, Fut, T, E>(attempts: u32, mut connect: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=attempts {
        match connect().await {
            Ok(value) => return Some(value),
            Err(err) if attempt == attempts => {
                warn!(
                    attempt,
                    error = %err,
                    "exhausted storage connection attempts; falling back to local storage"
                );
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    None
}

/// Poll the backend forever and keep the shared degraded flag current.
pub async fn run(state: SharedState) {
    loop {
        match state.sync().store().health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                }
                state.update_degraded(false);
            }
            Err(err) => {
                if !state.is_degraded() {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                }
                state.update_degraded(true);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}
