//! Backend-agnostic access to JSON documents grouped in collections.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod local;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::Value;

use crate::dao::storage::StorageResult;

/// Address of a document: a collection path plus a document id inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    collection: String,
    id: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Which kind of backend the documents are synced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Hosted document database shared by every client.
    Remote,
    /// Files on the local disk, visible to this process only.
    Local,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Remote => "remote",
            StorageMode::Local => "local",
        }
    }
}

/// Abstraction over the persistence layer holding whole JSON documents.
///
/// Documents are always written in full; there is no partial update and no
/// merge, the last write wins.
pub trait DocumentStore: Send + Sync {
    fn get_document(&self, key: &DocumentKey) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    fn put_document(&self, key: &DocumentKey, document: Value)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Continuous feed of the document's content after each remote change, or
    /// `None` when the backend has no change notifications.
    fn watch_document(&self, key: &DocumentKey)
    -> Option<BoxStream<'static, StorageResult<Value>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
