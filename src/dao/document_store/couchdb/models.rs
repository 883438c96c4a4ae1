use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::document_store::DocumentKey;

pub const KEY_SEPARATOR: &str = "::";
pub const UPLOAD_PREFIX: &str = "uploads";

/// Raw CouchDB document: reserved `_id`/`_rev` fields plus the application body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl CouchDocument {
    /// Wrap an application value into a CouchDB document.
    ///
    /// Non-object values are stored under a `value` field so every document
    /// stays a JSON object as CouchDB requires.
    pub fn new(id: String, rev: Option<String>, value: Value) -> Self {
        let body = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self { id, rev, body }
    }

    /// Application body without CouchDB bookkeeping fields (`_attachments`, ...).
    pub fn into_value(self) -> Value {
        let body = self
            .body
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect::<Map<_, _>>();
        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<CouchDocument>,
}

#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

pub fn doc_id(key: &DocumentKey) -> String {
    format!("{}{}{}", key.collection(), KEY_SEPARATOR, key.id())
}

pub fn upload_doc_id(folder: &str) -> String {
    format!("{}{}{}", UPLOAD_PREFIX, KEY_SEPARATOR, folder)
}

/// Render a `_changes` sequence token for use as a query parameter.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(token) => token.clone(),
        other => other.to_string(),
    }
}
