use ca_core::collections::RecordKind;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid api url: {0}")]
    Url(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub content_type: Option<String>,
    pub bytes_written: u64,
}

/// Typed wrapper over the admin HTTP API.
#[derive(Clone)]
pub struct AdminClient {
    base_url: Url,
    http: reqwest::Client,
}

impl AdminClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ClientError::Url("api url is empty".into()));
        }
        let base_url = Url::parse(trimmed).map_err(|err| ClientError::Url(err.to_string()))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::builder().build()?,
        })
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn kind_url(&self, kind: RecordKind, rest: &[&str]) -> ClientResult<Url> {
        let mut segments = vec!["v1", "admin", kind.route_segment()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn send_json(&self, builder: reqwest::RequestBuilder) -> ClientResult<Value> {
        let resp = ensure_success(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn health(&self) -> ClientResult<Value> {
        let url = self.url(&["healthz"])?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn list_records(
        &self,
        kind: RecordKind,
        community: Option<&str>,
        limit: Option<usize>,
    ) -> ClientResult<Value> {
        let url = self.kind_url(kind, &[])?;
        let mut builder = self.http.get(url);
        if let Some(community) = community {
            builder = builder.query(&[("community", community)]);
        }
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        self.send_json(builder).await
    }

    pub async fn get_record(&self, kind: RecordKind, id: &str) -> ClientResult<Value> {
        let url = self.kind_url(kind, &[id])?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_record(&self, kind: RecordKind, fields: &Value) -> ClientResult<Value> {
        let url = self.kind_url(kind, &[])?;
        self.send_json(self.http.post(url).json(fields)).await
    }

    pub async fn update_record(
        &self,
        kind: RecordKind,
        id: &str,
        fields: &Value,
    ) -> ClientResult<Value> {
        let url = self.kind_url(kind, &[id])?;
        self.send_json(self.http.put(url).json(fields)).await
    }

    pub async fn delete_record(&self, kind: RecordKind, id: &str) -> ClientResult<Value> {
        let url = self.kind_url(kind, &[id])?;
        self.send_json(self.http.request(Method::DELETE, url)).await
    }

    pub async fn resolve_community(&self, name: &str) -> ClientResult<Value> {
        let url = self.kind_url(RecordKind::Communities, &["resolve"])?;
        self.send_json(self.http.get(url).query(&[("name", name)]))
            .await
    }

    pub async fn lookup_community(&self, identifier: &str) -> ClientResult<Value> {
        let url = self.kind_url(RecordKind::Communities, &["lookup"])?;
        self.send_json(self.http.get(url).query(&[("identifier", identifier)]))
            .await
    }

    pub async fn community_members(&self, identifier: &str) -> ClientResult<Value> {
        let url = self.kind_url(RecordKind::Communities, &[identifier, "members"])?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn associate_community(
        &self,
        name: &str,
        include_unaffiliated: bool,
    ) -> ClientResult<Value> {
        let url = self.kind_url(RecordKind::Communities, &["associate"])?;
        let body = json!({
            "name": name,
            "include_unaffiliated": include_unaffiliated
        });
        self.send_json(self.http.post(url).json(&body)).await
    }

    /// Sends `file` as the multipart `file` part next to the given text fields.
    pub async fn upload_document(
        &self,
        file: &Path,
        content_type: Option<&str>,
        fields: &[(String, String)],
    ) -> ClientResult<Value> {
        let data = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(content_type.unwrap_or("application/octet-stream"))?;

        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        let form = form.part("file", part);

        let url = self.kind_url(RecordKind::Documents, &[])?;
        self.send_json(self.http.post(url).multipart(form)).await
    }

    /// Streams the stored file into `dest`.
    pub async fn download_document(&self, id: &str, dest: &Path) -> ClientResult<Download> {
        let url = self.kind_url(RecordKind::Documents, &[id, "download"])?;
        let mut resp = ensure_success(self.http.get(url).send().await?).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut out = tokio::fs::File::create(dest).await?;
        let mut bytes_written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            out.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        out.flush().await?;

        Ok(Download {
            content_type,
            bytes_written,
        })
    }
}

async fn ensure_success(resp: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    let payload: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        payload
            .as_ref()
            .and_then(|payload| payload.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    ClientError::Api {
        status: status.as_u16(),
        code: field("code").unwrap_or_else(|| "HTTP_ERROR".to_string()),
        message: field("message").unwrap_or_else(|| body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_url_encodes_ids_and_keeps_base_path() {
        let client = AdminClient::new("http://127.0.0.1:8081/").unwrap();
        let url = client
            .kind_url(RecordKind::ResourceContent, &["a/b"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8081/v1/admin/resource-content/a%2Fb"
        );
    }

    #[test]
    fn api_error_reads_code_and_message() {
        let err = api_error(
            StatusCode::NOT_FOUND,
            r#"{"code":"NOT_FOUND","message":"community not found: Nowhere","details":null}"#,
        );
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NOT_FOUND");
                assert_eq!(message, "community not found: Nowhere");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.to_string(), "HTTP_ERROR (502): upstream down");
    }

    #[test]
    fn empty_api_url_is_rejected() {
        assert!(matches!(
            AdminClient::new("  "),
            Err(ClientError::Url(_))
        ));
    }
}
