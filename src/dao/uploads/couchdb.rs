use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::dao::document_store::couchdb::{CouchDocumentStore, models::upload_doc_id};

use super::{ImageUploader, UploadError, UploadPath};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Stores uploads as attachments of one `uploads::<folder>` document per folder.
#[derive(Clone)]
pub struct CouchImageUploader {
    store: CouchDocumentStore,
    timeout: Duration,
    max_attempts: u32,
}

impl CouchImageUploader {
    pub fn new(store: CouchDocumentStore, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            store,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn upload_with_retry(
        &self,
        path: &UploadPath,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError> {
        let doc_id = upload_doc_id(&path.folder);
        let mut delay = INITIAL_RETRY_DELAY;

        for attempt in 1..=self.max_attempts {
            let outcome = self
                .store
                .put_attachment(&doc_id, &path.file_name, content_type, bytes.clone())
                .await;

            match outcome {
                Ok(()) => {
                    self.verify_length(&doc_id, &path.file_name, bytes.len())
                        .await?;
                    return Ok(self
                        .store
                        .document_url(&format!("{doc_id}/{}", path.file_name)));
                }
                Err(err) => match err.status() {
                    Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                        return Err(UploadError::Unauthorized);
                    }
                    Some(status) if !status.is_server_error() && status != StatusCode::CONFLICT => {
                        warn!(%status, "attachment upload failed");
                        return Err(UploadError::Unknown);
                    }
                    _ => warn!(attempt, error = %err, "attachment upload failed; retrying"),
                },
            }

            sleep(delay).await;
            delay *= 2;
        }

        Err(UploadError::RetryLimitExceeded)
    }

    async fn verify_length(
        &self,
        doc_id: &str,
        name: &str,
        expected: usize,
    ) -> Result<(), UploadError> {
        match self.store.attachment_length(doc_id, name).await {
            Ok(Some(length)) if length == expected as u64 => Ok(()),
            Ok(Some(length)) => {
                warn!(doc_id, name, expected, length, "stored attachment size mismatch");
                Err(UploadError::ChecksumMismatch)
            }
            Ok(None) => Ok(()),
            Err(err) => Err(UploadError::Other(err.to_string())),
        }
    }
}

impl ImageUploader for CouchImageUploader {
    fn upload(
        &self,
        path: UploadPath,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, Result<String, UploadError>> {
        let uploader = self.clone();
        Box::pin(async move {
            timeout(
                uploader.timeout,
                uploader.upload_with_retry(&path, &content_type, bytes),
            )
            .await
            .unwrap_or(Err(UploadError::Canceled))
        })
    }
}
