use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::dao::{
    document_store::{DocumentKey, DocumentStore},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{ChangesResponse, CouchDocument, WriteResponse, doc_id, seq_param},
};

const CHANGES: &str = "_changes";
/// How long CouchDB holds a long-poll `_changes` request open without news.
const LONGPOLL_TIMEOUT_MS: u64 = 30_000;
const CHANGES_RETRY_DELAY: Duration = Duration::from_secs(2);
/// First `since` of a feed. With the `_doc_ids` filter the first answer is
/// the document's current revision, so writes made between the initial read
/// and the first poll are not missed.
const FEED_START_SEQ: u64 = 0;
/// A write retried with a fresh `_rev` after this many revision conflicts gives up.
const MAX_CONFLICT_RETRIES: u32 = 2;

/// Document backend shared by every server pointing at the same database.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    database_url: Arc<str>,
    credentials: Option<Arc<(String, String)>>,
}

impl CouchDocumentStore {
    /// Connect to the configured database, creating it when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;
        let database_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.database
        );
        let store = Self {
            client,
            database_url: database_url.into(),
            credentials: config.credentials.map(Arc::new),
        };

        match store.send(Method::GET, "", |request| request).await {
            Ok(_) => {}
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                store.send(Method::PUT, "", |request| request).await?;
                info!(database = %config.database, "created CouchDB database");
            }
            Err(err) => return Err(err),
        }
        Ok(store)
    }

    /// Absolute URL of `path` inside the database. An empty path is the database itself.
    pub fn document_url(&self, path: &str) -> String {
        if path.is_empty() {
            self.database_url.to_string()
        } else {
            format!("{}/{path}", self.database_url)
        }
    }

    /// Send one authorized request and keep only successful answers.
    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> CouchResult<Response> {
        let mut request = self.client.request(method.clone(), self.document_url(path));
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.0, Some(&credentials.1));
        }

        let response = build(request)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                method: method.clone(),
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(CouchDaoError::Status {
                method,
                path: path.to_string(),
                status,
            })
        }
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::Decode {
                path: path.to_string(),
                source,
            })
    }

    async fn fetch(&self, doc_id: &str) -> CouchResult<Option<CouchDocument>> {
        match self.send(Method::GET, doc_id, |request| request).await {
            Ok(response) => Self::decode(doc_id, response).await.map(Some),
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Current revision of a document, `None` when it does not exist yet.
    pub(crate) async fn current_revision(&self, doc_id: &str) -> CouchResult<Option<String>> {
        Ok(self.fetch(doc_id).await?.and_then(|doc| doc.rev))
    }

    /// Overwrite the document body on top of its latest revision.
    ///
    /// A conflict means another writer got in between; the write is replayed
    /// against their revision so the last writer wins.
    async fn save(&self, doc_id: &str, value: Value) -> CouchResult<()> {
        let mut conflicts = 0;
        loop {
            let rev = self.current_revision(doc_id).await?;
            let document = CouchDocument::new(doc_id.to_string(), rev, value.clone());
            let written = self
                .send(Method::PUT, doc_id, |request| request.json(&document))
                .await;
            match written {
                Ok(response) => {
                    let written: WriteResponse = Self::decode(doc_id, response).await?;
                    debug!(doc_id, rev = %written.rev, "CouchDB document written");
                    return Ok(());
                }
                Err(err) if err.is_conflict() && conflicts < MAX_CONFLICT_RETRIES => {
                    conflicts += 1;
                    warn!(doc_id, conflicts, "CouchDB revision conflict; retrying write");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn poll_changes(&self, doc_id: &str, since: &Value) -> CouchResult<ChangesResponse> {
        let query = changes_query(doc_id, since);
        let response = self
            .send(Method::GET, CHANGES, |request| request.query(&query))
            .await?;
        Self::decode(CHANGES, response).await
    }

    /// Store `bytes` as an attachment of `doc_id`, creating the document when needed.
    pub(crate) async fn put_attachment(
        &self,
        doc_id: &str,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> CouchResult<()> {
        let rev = self.current_revision(doc_id).await?;
        self.send(Method::PUT, &format!("{doc_id}/{name}"), |request| {
            let request = request
                .header(header::CONTENT_TYPE, content_type)
                .body(bytes);
            match rev {
                Some(rev) => request.query(&[("rev", rev)]),
                None => request,
            }
        })
        .await?;
        Ok(())
    }

    /// Size in bytes of a stored attachment as reported by CouchDB.
    pub(crate) async fn attachment_length(&self, doc_id: &str, name: &str) -> CouchResult<Option<u64>> {
        let response = self
            .send(Method::HEAD, &format!("{doc_id}/{name}"), |request| request)
            .await?;
        Ok(response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok()))
    }
}

impl DocumentStore for CouchDocumentStore {
    fn get_document(&self, key: &DocumentKey) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let doc_id = doc_id(key);
        Box::pin(async move {
            let document = store.fetch(&doc_id).await?;
            Ok(document.map(CouchDocument::into_value))
        })
    }

    fn put_document(
        &self,
        key: &DocumentKey,
        document: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let doc_id = doc_id(key);
        Box::pin(async move { store.save(&doc_id, document).await.map_err(Into::into) })
    }

    fn watch_document(
        &self,
        key: &DocumentKey,
    ) -> Option<BoxStream<'static, StorageResult<Value>>> {
        let store = self.clone();
        let doc_id = doc_id(key);
        let stream = async_stream::stream! {
            let mut since = Value::from(FEED_START_SEQ);
            loop {
                match store.poll_changes(&doc_id, &since).await {
                    Ok(changes) => {
                        let docs = changes
                            .results
                            .into_iter()
                            .filter(|row| !row.deleted && row.id == doc_id)
                            .filter_map(|row| row.doc);
                        for doc in docs {
                            yield Ok(doc.into_value());
                        }
                        since = changes.last_seq;
                    }
                    Err(err) => {
                        yield Err(StorageError::from(err));
                        sleep(CHANGES_RETRY_DELAY).await;
                    }
                }
            }
        };
        Some(Box::pin(stream))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.send(Method::GET, "", |request| request).await?;
            Ok(())
        })
    }
}

/// Long-poll `_changes` parameters following one document from `since`.
fn changes_query(doc_id: &str, since: &Value) -> [(&'static str, String); 6] {
    [
        ("feed", "longpoll".to_string()),
        ("filter", "_doc_ids".to_string()),
        ("doc_ids", Value::from(vec![doc_id.to_string()]).to_string()),
        ("include_docs", "true".to_string()),
        ("timeout", LONGPOLL_TIMEOUT_MS.to_string()),
        ("since", seq_param(since)),
    ]
}
