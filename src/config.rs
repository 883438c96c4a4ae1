//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{game::DEFAULT_EXPIRY_DAYS, sync::DEFAULT_LOADING_DELAY};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DIVI_BACK_CONFIG_PATH";

const DEFAULT_NAMESPACE: &str = "divi";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_ATTEMPTS: u32 = 3;
const DEFAULT_IDLE_GAME_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Prefix of every local storage entry holding a document.
    pub namespace: String,
    /// Directory holding local documents, preferences and uploaded images.
    pub data_dir: PathBuf,
    pub game_expiry_days: u64,
    /// How long local documents report loading before becoming ready.
    pub loading_delay: Duration,
    /// Origin used to build shareable links and local upload URLs.
    pub public_base_url: String,
    pub upload_timeout: Duration,
    pub upload_max_attempts: u32,
    /// How long an unused open game stays in memory before it is closed.
    pub idle_game_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        data_dir = %app_config.data_dir.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Lifetime given to newly created games.
    pub fn game_expiry(&self) -> Duration {
        crate::state::game::expiry_after_days(self.game_expiry_days)
    }

    /// Directory where locally stored images are written and served from.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every key is optional.
struct RawConfig {
    namespace: Option<String>,
    data_dir: Option<PathBuf>,
    game_expiry_days: Option<u64>,
    loading_delay_ms: Option<u64>,
    public_base_url: Option<String>,
    upload_timeout_secs: Option<u64>,
    upload_max_attempts: Option<u32>,
    idle_game_timeout_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            namespace: value
                .namespace
                .filter(|namespace| !namespace.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.into()),
            data_dir: value
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            game_expiry_days: value.game_expiry_days.unwrap_or(DEFAULT_EXPIRY_DAYS),
            loading_delay: value
                .loading_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LOADING_DELAY),
            public_base_url: value
                .public_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into()),
            upload_timeout: value
                .upload_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPLOAD_TIMEOUT),
            upload_max_attempts: value
                .upload_max_attempts
                .unwrap_or(DEFAULT_UPLOAD_ATTEMPTS)
                .max(1),
            idle_game_timeout: value
                .idle_game_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_IDLE_GAME_TIMEOUT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
