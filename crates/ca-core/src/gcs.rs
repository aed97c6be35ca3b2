use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};

use crate::config::StorageConfig;
use crate::storage::{BlobDownload, BlobError, BlobInfo, BlobStore};

const PRODUCTION_BASE_URL: &str = "https://storage.googleapis.com";

/// Cloud Storage JSON API client for the attachments bucket.
#[derive(Clone)]
pub struct GcsBlobStore {
    base_url: Url,
    bucket: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl GcsBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self, BlobError> {
        let (raw_base, access_token) = match &config.emulator_host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                (host.trim_end_matches('/').to_string(), None)
            }
            Some(host) => (format!("http://{}", host.trim_end_matches('/')), None),
            None => (PRODUCTION_BASE_URL.to_string(), config.access_token.clone()),
        };
        let base_url = Url::parse(&raw_base).map_err(|err| BlobError::Url(err.to_string()))?;
        Ok(Self {
            base_url,
            bucket: config.bucket.clone(),
            access_token,
            http: reqwest::Client::builder().build()?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BlobError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, path: &str) -> Result<Url, BlobError> {
        // `extend` percent-encodes '/' so the object name stays one segment.
        self.url(&["storage", "v1", "b", &self.bucket, "o", path])
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobInfo, BlobError> {
        let size = data.len() as u64;
        let url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        let resp = self
            .request(Method::POST, url)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        ensure_success(resp).await?;
        tracing::debug!(path, size, "stored object");
        Ok(BlobInfo {
            path: path.to_string(),
            content_type: content_type.to_string(),
            size,
        })
    }

    async fn open(&self, path: &str) -> Result<Option<BlobDownload>, BlobError> {
        let url = self.object_url(path)?;
        let resp = self
            .request(Method::GET, url)
            .query(&[("alt", "media")])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = ensure_success(resp).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let body = resp.bytes_stream().map_err(BlobError::from).boxed();
        Ok(Some(BlobDownload {
            content_type,
            content_length,
            body,
        }))
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        let url = self.object_url(path)?;
        let resp = self.request(Method::DELETE, url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(resp).await?;
        Ok(true)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BlobError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BlobError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(emulator_host: Option<&str>) -> GcsBlobStore {
        GcsBlobStore::new(&StorageConfig {
            bucket: "demo.appspot.com".into(),
            emulator_host: emulator_host.map(str::to_string),
            access_token: Some("token".into()),
        })
        .unwrap()
    }

    #[test]
    fn object_url_encodes_slashes_in_object_name() {
        let url = store(None).object_url("documents/abc/minutes.pdf").unwrap();
        assert_eq!(url.host_str(), Some("storage.googleapis.com"));
        assert_eq!(
            url.path(),
            "/storage/v1/b/demo.appspot.com/o/documents%2Fabc%2Fminutes.pdf"
        );
    }

    #[test]
    fn emulator_host_drops_credentials() {
        let gcs = store(Some("localhost:9199"));
        assert!(gcs.access_token.is_none());
        let url = gcs.url(&["upload", "storage", "v1", "b", "demo.appspot.com", "o"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9199/upload/storage/v1/b/demo.appspot.com/o"
        );
    }
}
