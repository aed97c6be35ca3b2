use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid storage url: {0}")]
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub path: String,
    pub content_type: String,
    pub size: u64,
}

pub struct BlobDownload {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, BlobError>>,
}

impl BlobDownload {
    /// Drains the stream; only for small objects and tests.
    pub async fn collect_bytes(self) -> Result<Vec<u8>, BlobError> {
        let mut body = self.body;
        let mut buffer = Vec::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer)
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, content_type: &str, data: Bytes)
        -> Result<BlobInfo, BlobError>;

    async fn open(&self, path: &str) -> Result<Option<BlobDownload>, BlobError>;

    /// `false` when nothing was stored at `path`.
    async fn delete(&self, path: &str) -> Result<bool, BlobError>;
}

/// Object key for an uploaded document: `documents/<uuid>/<file name>`.
pub fn document_object_path(file_name: &str) -> String {
    format!(
        "documents/{}/{}",
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|ch: char| ch == '/' || ch == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, (String, Bytes)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobInfo, BlobError> {
        let size = data.len() as u64;
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), data));
        Ok(BlobInfo {
            path: path.to_string(),
            content_type: content_type.to_string(),
            size,
        })
    }

    async fn open(&self, path: &str) -> Result<Option<BlobDownload>, BlobError> {
        let objects = self.objects.read().await;
        Ok(objects.get(path).map(|(content_type, data)| {
            let chunk: Result<Bytes, BlobError> = Ok(data.clone());
            BlobDownload {
                content_type: content_type.clone(),
                content_length: Some(data.len() as u64),
                body: stream::once(async move { chunk }).boxed(),
            }
        }))
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.objects.write().await.remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_file_name_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\Band Council.pdf"), "Band_Council.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name("   "), "upload.bin");
    }

    #[test]
    fn document_object_path_is_namespaced() {
        let path = document_object_path("minutes.pdf");
        assert!(path.starts_with("documents/"));
        assert!(path.ends_with("/minutes.pdf"));
    }

    #[tokio::test]
    async fn memory_blob_store_round_trips_and_deletes() {
        let store = MemoryBlobStore::new();
        let info = store
            .put("documents/x/a.txt", "text/plain", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(info.size, 5);

        let download = store.open("documents/x/a.txt").await.unwrap().unwrap();
        assert_eq!(download.content_type, "text/plain");
        assert_eq!(download.collect_bytes().await.unwrap(), b"hello");

        assert!(store.delete("documents/x/a.txt").await.unwrap());
        assert!(store.open("documents/x/a.txt").await.unwrap().is_none());
    }
}
