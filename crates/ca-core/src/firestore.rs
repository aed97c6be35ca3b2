//! Firestore REST (v1) client implementing [`DocumentStore`].
//!
//! Documents travel as typed value maps (`{"stringValue": "..."}` etc.); the
//! codec below converts them to and from plain JSON so the rest of the crate
//! only ever sees `serde_json::Value`.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Map, Value};

use crate::config::FirestoreConfig;
use crate::store::{is_valid_document_id, DocumentStore, Fields, Record, StoreError};

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

#[derive(Clone)]
pub struct FirestoreStore {
    documents_url: Url,
    database_path: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl FirestoreStore {
    pub fn new(config: &FirestoreConfig) -> Result<Self, StoreError> {
        let (base_url, access_token) = match &config.emulator_host {
            Some(host) => (emulator_base_url(host), None),
            None => (PRODUCTION_BASE_URL.to_string(), config.access_token.clone()),
        };
        let database_path = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database
        );
        let documents_url = Url::parse(&format!("{base_url}/{database_path}"))
            .map_err(|err| StoreError::Url(err.to_string()))?;
        Ok(Self {
            documents_url,
            database_path,
            access_token,
            http: reqwest::Client::builder().build()?,
        })
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Appends percent-encoded segments, so an id never spans more than one.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Url(self.documents_url.to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// `documents:runQuery` and friends.
    fn database_method_url(&self, method: &str) -> Result<Url, StoreError> {
        Url::parse(&format!("{}:{method}", self.documents_url))
            .map_err(|err| StoreError::Url(err.to_string()))
    }

    fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
        self.url(&[collection])
    }

    /// `None` for ids Firestore cannot address as a single document.
    fn document_url(&self, collection: &str, id: &str) -> Result<Option<Url>, StoreError> {
        if !is_valid_document_id(id) {
            tracing::debug!(collection, id, "rejected invalid document id");
            return Ok(None);
        }
        self.url(&[collection, id]).map(Some)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let url = self.collection_url(collection)?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let resp = self
                .request(Method::GET, url.clone())
                .query(&query)
                .send()
                .await?;
            let body = read_json(resp).await?;

            if let Some(documents) = body.get("documents").and_then(Value::as_array) {
                for document in documents {
                    records.push(decode_document(document)?);
                }
            }

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let url = self.database_method_url("runQuery")?;
        let payload = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": quote_field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value)
                    }
                }
            }
        });
        let resp = self.request(Method::POST, url).json(&payload).send().await?;
        let body = read_json(resp).await?;

        let rows = body
            .as_array()
            .ok_or_else(|| StoreError::Decode("runQuery response is not an array".into()))?;
        let mut records = Vec::new();
        for row in rows {
            if let Some(document) = row.get("document") {
                records.push(decode_document(document)?);
            }
        }
        Ok(records)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let Some(url) = self.document_url(collection, id)? else {
            return Ok(None);
        };
        let resp = self.request(Method::GET, url).send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_json(resp).await?;
        Ok(Some(decode_document(&body)?))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        let resp = self
            .request(Method::POST, self.collection_url(collection)?)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        let body = read_json(resp).await?;
        decode_document(&body)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Option<Record>, StoreError> {
        let Some(url) = self.document_url(collection, id)? else {
            return Ok(None);
        };
        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", quote_field_path(key)))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let resp = self
            .request(Method::PATCH, url)
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_json(resp).await?;
        Ok(Some(decode_document(&body)?))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let Some(url) = self.document_url(collection, id)? else {
            return Ok(false);
        };
        let resp = self
            .request(Method::DELETE, url)
            .query(&[("currentDocument.exists", "true")])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        read_json(resp).await?;
        Ok(true)
    }

    async fn check_ready(&self) -> Result<(), StoreError> {
        let url = self.database_method_url("listCollectionIds")?;
        let resp = self
            .request(Method::POST, url)
            .json(&json!({ "pageSize": 1 }))
            .send()
            .await?;
        read_json(resp).await.map(|_| ())
    }
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("database_path", &self.database_path)
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

fn emulator_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/v1")
    } else {
        format!("http://{host}/v1")
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, StoreError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|err| StoreError::Decode(err.to_string()))
}

/// Field paths outside `[A-Za-z_][A-Za-z0-9_]*` must be back-quoted.
pub fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        None => false,
    };
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Last path segment of a resource name like `projects/p/databases/d/documents/users/abc`.
pub fn document_id_from_name(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

pub fn decode_document(document: &Value) -> Result<Record, StoreError> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document without name".into()))?;
    let id = document_id_from_name(name)
        .ok_or_else(|| StoreError::Decode(format!("document name without id: {name}")))?;

    let mut fields = Fields::new();
    if let Some(raw_fields) = document.get("fields").and_then(Value::as_object) {
        for (key, value) in raw_fields {
            fields.insert(key.clone(), decode_value(value));
        }
    }
    Ok(Record::new(id, fields))
}

pub fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => match number.as_i64() {
            Some(int) => json!({ "integerValue": int.to_string() }),
            None => json!({ "doubleValue": number.as_f64().unwrap_or_default() }),
        },
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => inner
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(Value::from)
            .unwrap_or(Value::Null),
        "doubleValue" => inner
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(key, value)| (key.clone(), decode_value(value)))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_document_flattens_typed_values() {
        let document = json!({
            "name": "projects/demo/databases/(default)/documents/users/u1",
            "fields": {
                "email": { "stringValue": "a@example.org" },
                "age": { "integerValue": "42" },
                "community": { "nullValue": null },
                "favoriteCommunities": {
                    "arrayValue": { "values": [{ "stringValue": "c1" }] }
                },
                "joinedAt": { "timestampValue": "2024-01-02T03:04:05Z" },
                "profile": {
                    "mapValue": { "fields": { "verified": { "booleanValue": true } } }
                }
            }
        });

        let record = decode_document(&document).unwrap();
        assert_eq!(record.id, "u1");
        assert_eq!(record.fields["email"], json!("a@example.org"));
        assert_eq!(record.fields["age"], json!(42));
        assert_eq!(record.fields["community"], Value::Null);
        assert_eq!(record.fields["favoriteCommunities"], json!(["c1"]));
        assert_eq!(record.fields["joinedAt"], json!("2024-01-02T03:04:05Z"));
        assert_eq!(record.fields["profile"], json!({ "verified": true }));
    }

    #[test]
    fn decode_value_handles_empty_array_value() {
        assert_eq!(decode_value(&json!({ "arrayValue": {} })), json!([]));
    }

    #[test]
    fn encode_value_string_encodes_integers_and_keeps_doubles() {
        assert_eq!(encode_value(&json!(7)), json!({ "integerValue": "7" }));
        assert_eq!(encode_value(&json!(1.5)), json!({ "doubleValue": 1.5 }));
        assert_eq!(
            encode_value(&json!({ "tags": ["a"] })),
            json!({
                "mapValue": { "fields": {
                    "tags": { "arrayValue": { "values": [{ "stringValue": "a" }] } }
                } }
            })
        );
    }

    #[test]
    fn quote_field_path_backquotes_non_identifiers() {
        assert_eq!(quote_field_path("favoriteCommunities"), "favoriteCommunities");
        assert_eq!(quote_field_path("_private"), "_private");
        assert_eq!(quote_field_path("first name"), "`first name`");
        assert_eq!(quote_field_path("2fa"), "`2fa`");
        assert_eq!(quote_field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn emulator_base_url_accepts_bare_host_or_url() {
        assert_eq!(emulator_base_url("localhost:8080"), "http://localhost:8080/v1");
        assert_eq!(
            emulator_base_url("http://127.0.0.1:8080/"),
            "http://127.0.0.1:8080/v1"
        );
    }

    #[test]
    fn new_store_builds_documents_root() {
        let store = FirestoreStore::new(&FirestoreConfig {
            project_id: "demo".into(),
            database: "(default)".into(),
            emulator_host: Some("localhost:8080".into()),
            access_token: Some("ignored-for-emulator".into()),
        })
        .unwrap();
        let url = store.document_url("users", "u1").unwrap().unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/users/u1"
        );
        assert_eq!(
            store.database_method_url("runQuery").unwrap().as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents:runQuery"
        );
        assert!(store.access_token.is_none());
    }

    fn emulator_store() -> FirestoreStore {
        FirestoreStore::new(&FirestoreConfig {
            project_id: "demo".into(),
            database: "(default)".into(),
            emulator_host: Some("localhost:8080".into()),
            access_token: None,
        })
        .unwrap()
    }

    #[test]
    fn document_url_keeps_query_and_fragment_characters_inside_the_id() {
        let store = emulator_store();
        let url = store.document_url("users", "a?x=1#f").unwrap().unwrap();
        assert_eq!(
            url.path(),
            "/v1/projects/demo/databases/(default)/documents/users/a%3Fx=1%23f"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn document_url_refuses_ids_that_would_leave_the_collection() {
        let store = emulator_store();
        for id in ["../communities/c1", "u1/posts/p1", "..", ""] {
            assert!(
                store.document_url("users", id).unwrap().is_none(),
                "id {id:?} should not be addressable"
            );
        }
    }

    #[tokio::test]
    async fn invalid_ids_are_not_found_without_a_request() {
        // Port 9 is discard; any request made here would fail with an Http error.
        let store = FirestoreStore::new(&FirestoreConfig {
            project_id: "demo".into(),
            database: "(default)".into(),
            emulator_host: Some("127.0.0.1:9".into()),
            access_token: None,
        })
        .unwrap();
        let patch = Fields::new();
        assert!(store.get("users", "../communities/c1").await.unwrap().is_none());
        assert!(store
            .update("users", "u1/posts/p1", patch)
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete("users", "../communities/c1").await.unwrap());
    }
}
