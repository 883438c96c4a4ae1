use std::sync::Arc;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::Value;

use crate::dao::{
    document_store::{DocumentKey, DocumentStore},
    storage::{StorageError, StorageResult},
};

use super::{error::LocalStoreError, storage::LocalStorage};

/// Document backend persisting each document as one local storage entry.
///
/// Entries are keyed `<namespace>_<collection>_<docId>` and hold the
/// document's JSON text.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    storage: LocalStorage,
    namespace: Arc<str>,
}

impl LocalDocumentStore {
    pub fn new(storage: LocalStorage, namespace: impl Into<Arc<str>>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn storage_key(&self, key: &DocumentKey) -> String {
        format!("{}_{}_{}", self.namespace, key.collection(), key.id())
    }
}

impl DocumentStore for LocalDocumentStore {
    fn get_document(&self, key: &DocumentKey) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let storage = self.storage.clone();
        let entry = self.storage_key(key);
        Box::pin(async move {
            let Some(contents) = storage.get_item(&entry).await? else {
                return Ok(None);
            };
            serde_json::from_str(&contents)
                .map(Some)
                .map_err(|source| StorageError::Malformed { key: entry, source })
        })
    }

    fn put_document(
        &self,
        key: &DocumentKey,
        document: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let storage = self.storage.clone();
        let entry = self.storage_key(key);
        Box::pin(async move {
            let contents = document.to_string();
            storage.set_item(&entry, &contents).await?;
            Ok(())
        })
    }

    fn watch_document(
        &self,
        _key: &DocumentKey,
    ) -> Option<BoxStream<'static, StorageResult<Value>>> {
        None
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let root = self.storage.root().to_path_buf();
        Box::pin(async move {
            tokio::fs::metadata(&root)
                .await
                .map(|_| ())
                .map_err(|source| LocalStoreError::Read { path: root, source }.into())
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn store(dir: &tempfile::TempDir) -> LocalDocumentStore {
        let storage = LocalStorage::open(dir.path()).await.unwrap();
        LocalDocumentStore::new(storage, "divi")
    }

    #[tokio::test]
    async fn documents_are_namespaced_per_collection_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let key = DocumentKey::new("games", "abc123");

        assert_eq!(store.storage_key(&key), "divi_games_abc123");
        store
            .put_document(&key, json!({ "id": "abc123", "started": false }))
            .await
            .unwrap();

        let raw = store.storage().get_item("divi_games_abc123").await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&raw.unwrap()).unwrap(),
            json!({ "id": "abc123", "started": false })
        );
        assert_eq!(
            store.get_document(&key).await.unwrap(),
            Some(json!({ "id": "abc123", "started": false }))
        );
    }

    #[tokio::test]
    async fn missing_document_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let found = store
            .get_document(&DocumentKey::new("features", "donations"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store
            .storage()
            .set_item("divi_games_broken", "{not json")
            .await
            .unwrap();

        let err = store
            .get_document(&DocumentKey::new("games", "broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
    }
}
