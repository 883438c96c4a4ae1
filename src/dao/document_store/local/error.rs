use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dao::storage::StorageError;

pub type LocalResult<T> = Result<T, LocalStoreError>;

/// Failures of the on-disk fallback storage.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("invalid local storage key `{key}`")]
    InvalidKey { key: String },
    #[error("failed to create local storage directory `{}`", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read local storage entry `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write local storage entry `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<LocalStoreError> for StorageError {
    fn from(err: LocalStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
