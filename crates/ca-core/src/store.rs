use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::collections::FIELD_ID;

pub type Fields = Map<String, Value>;

/// A stored document: its key plus its field map.
///
/// Serialized flat as `{"id": <document id>, ...fields}`. A stored field that is
/// itself named `id` stays in `fields` but is shadowed by the document id on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shadowed = usize::from(self.fields.contains_key(FIELD_ID));
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1 - shadowed))?;
        map.serialize_entry(FIELD_ID, &self.id)?;
        for (key, value) in &self.fields {
            if key == FIELD_ID {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Firestore document id rules: one non-empty path segment, not `.`/`..`,
/// not `__reserved__`, at most 1500 bytes.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 1500
        && !id.contains('/')
        && id != "."
        && id != ".."
        && !(id.len() > 4 && id.starts_with("__") && id.ends_with("__"))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed document: {0}")]
    Decode(String),

    #[error("invalid document store url: {0}")]
    Url(String),
}

/// Document database seam. Every handler and the association sweep go through this.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Merges `fields` into an existing document. `None` when it does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Option<Record>, StoreError>;

    /// `false` when the document did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn check_ready(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document under a fixed id without counting it as a write.
    pub async fn seed(&self, collection: &str, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Number of create/update/delete calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn next_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..20].to_string()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Record::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.list(collection).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.fields.get(field) == Some(value))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Record::new(id, fields.clone())))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let id = Self::next_id();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields.clone());
        Ok(Record::new(id, fields))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Option<Record>, StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut collections = self.collections.write().await;
        let Some(existing) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(None);
        };
        for (key, value) in fields {
            existing.insert(key, value);
        }
        Ok(Some(Record::new(id, existing.clone())))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn check_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_document_id_over_stored_id_field() {
        let mut fields = Fields::new();
        fields.insert("id".into(), json!("legacy-7"));
        fields.insert("name".into(), json!("Elsipogtog First Nation"));
        let record = Record::new("doc-1", fields);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "doc-1", "name": "Elsipogtog First Nation"}));
    }

    #[test]
    fn document_ids_must_be_single_segments() {
        assert!(is_valid_document_id("u1"));
        assert!(is_valid_document_id("a?x=1#f"));
        assert!(!is_valid_document_id(""));
        assert!(!is_valid_document_id(".."));
        assert!(!is_valid_document_id("u1/posts/p1"));
        assert!(!is_valid_document_id("../communities/c1"));
        assert!(!is_valid_document_id("__name__"));
        assert!(!is_valid_document_id(&"x".repeat(1501)));
    }

    #[tokio::test]
    async fn memory_store_update_merges_and_reports_missing() {
        let store = MemoryStore::new();
        store
            .seed("posts", "p1", json!({"title": "Hello", "community": "A"}))
            .await;

        let mut patch = Fields::new();
        patch.insert("community".into(), json!("B"));
        let updated = store.update("posts", "p1", patch.clone()).await.unwrap().unwrap();
        assert_eq!(updated.str_field("title"), Some("Hello"));
        assert_eq!(updated.str_field("community"), Some("B"));

        assert!(store.update("posts", "missing", patch).await.unwrap().is_none());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_find_by_field_matches_exact_values() {
        let store = MemoryStore::new();
        store.seed("communities", "c1", json!({"name": "Alpha"})).await;
        store.seed("communities", "c2", json!({"name": "alpha"})).await;

        let found = store
            .find_by_field("communities", "name", &json!("Alpha"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c1");
    }

    #[tokio::test]
    async fn memory_store_delete_reports_existence() {
        let store = MemoryStore::new();
        let created = store.create("news", Fields::new()).await.unwrap();
        assert_eq!(created.id.len(), 20);
        assert!(store.delete("news", &created.id).await.unwrap());
        assert!(!store.delete("news", &created.id).await.unwrap());
    }
}
