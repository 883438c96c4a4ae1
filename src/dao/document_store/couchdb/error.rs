//! Failures of the CouchDB document backend.

use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::dao::storage::StorageError;

pub type CouchResult<T> = Result<T, CouchDaoError>;

#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A connection variable is unset or blank, so the remote backend is off.
    #[error("CouchDB is not configured: `{var}` is unset")]
    NotConfigured { var: &'static str },
    #[error("failed to build the CouchDB HTTP client")]
    Client(#[source] reqwest::Error),
    /// The request never got an answer.
    #[error("CouchDB request `{method} /{path}` failed")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} to `{method} /{path}`")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
    },
    #[error("CouchDB sent an unreadable body for `/{path}`")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CouchDaoError {
    /// Whether a write was refused because its `_rev` is stale.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CouchDaoError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
