//! Image upload collaborator: stores item pictures and hands back a public URL.

#[cfg(feature = "couch-store")]
mod couchdb;
mod local;

#[cfg(feature = "couch-store")]
pub use couchdb::CouchImageUploader;
pub use local::{LOCAL_UPLOADS_ROUTE, LocalImageUploader};

use futures::future::BoxFuture;
use thiserror::Error;

/// Why an upload did not produce a URL. Messages are meant for end users.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("you are not allowed to upload images")]
    Unauthorized,
    #[error("the upload was canceled before it completed")]
    Canceled,
    #[error("an unknown error occurred while uploading the image")]
    Unknown,
    #[error("the image was corrupted during upload, please try again")]
    ChecksumMismatch,
    #[error("the upload kept failing, please try again later")]
    RetryLimitExceeded,
    #[error("upload failed: {0}")]
    Other(String),
}

/// Where an uploaded file lives: one folder per game, then a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPath {
    pub folder: String,
    pub file_name: String,
}

impl UploadPath {
    pub fn new(folder: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            file_name: file_name.into(),
        }
    }
}

/// Backend able to persist an image and expose it at a fetchable URL.
pub trait ImageUploader: Send + Sync {
    fn upload(
        &self,
        path: UploadPath,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, Result<String, UploadError>>;
}
