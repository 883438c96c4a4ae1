use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use super::error::{LocalResult, LocalStoreError};

const ENTRY_EXTENSION: &str = "json";

/// String key/value entries kept as files in one directory.
///
/// Each entry lives in `<root>/<key>.json`; writes go through a temporary
/// file and a rename so readers never observe a half-written entry.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: Arc<PathBuf>,
}

impl LocalStorage {
    /// Open (and create when missing) the storage directory.
    pub async fn open(root: impl Into<PathBuf>) -> LocalResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| LocalStoreError::CreateDir {
                path: root.clone(),
                source,
            })?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn get_item(&self, key: &str) -> LocalResult<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LocalStoreError::Read { path, source }),
        }
    }

    pub async fn set_item(&self, key: &str, value: &str) -> LocalResult<()> {
        let path = self.entry_path(key)?;
        let staging = self
            .root
            .join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));

        fs::write(&staging, value)
            .await
            .map_err(|source| LocalStoreError::Write {
                path: staging.clone(),
                source,
            })?;
        if let Err(source) = fs::rename(&staging, &path).await {
            if let Err(err) = fs::remove_file(&staging).await {
                warn!(path = %staging.display(), error = %err, "failed to remove staging file");
            }
            return Err(LocalStoreError::Write { path, source });
        }
        Ok(())
    }

    fn entry_path(&self, key: &str) -> LocalResult<PathBuf> {
        if !is_valid_key(key) {
            return Err(LocalStoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.{ENTRY_EXTENSION}")))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.contains("..")
}
