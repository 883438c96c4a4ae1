use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::warn;

use super::{ImageUploader, UploadError, UploadPath};

/// Route prefix under which the service serves locally uploaded files.
pub const LOCAL_UPLOADS_ROUTE: &str = "/uploads";

/// Writes uploads below a directory that the HTTP layer serves statically.
#[derive(Debug, Clone)]
pub struct LocalImageUploader {
    root: Arc<PathBuf>,
    public_base_url: Arc<str>,
}

impl LocalImageUploader {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: Arc::new(root.into()),
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

fn io_error(err: std::io::Error) -> UploadError {
    match err.kind() {
        ErrorKind::PermissionDenied => UploadError::Unauthorized,
        _ => UploadError::Other(err.to_string()),
    }
}

impl ImageUploader for LocalImageUploader {
    fn upload(
        &self,
        path: UploadPath,
        _content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, Result<String, UploadError>> {
        let root = self.root.clone();
        let base = self.public_base_url.clone();
        Box::pin(async move {
            let folder = root.join(&path.folder);
            fs::create_dir_all(&folder).await.map_err(io_error)?;

            let target = folder.join(&path.file_name);
            fs::write(&target, &bytes).await.map_err(io_error)?;

            let written = fs::metadata(&target).await.map_err(io_error)?.len();
            if written != bytes.len() as u64 {
                warn!(
                    path = %target.display(),
                    expected = bytes.len(),
                    written,
                    "uploaded file size mismatch"
                );
                return Err(UploadError::ChecksumMismatch);
            }

            Ok(format!(
                "{base}{LOCAL_UPLOADS_ROUTE}/{}/{}",
                path.folder, path.file_name
            ))
        })
    }
}
