use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use ca_core::collections::RecordKind;
use ca_core::storage;
use ca_core::store::{Fields, Record};
use serde_json::Value;

use crate::records::{
    self, apply_update, into_fields, now_rfc3339, stamp_created, strip_managed_fields,
    DeleteResponse, ListQuery,
};
use crate::{ApiError, ApiResult, AppState, JsonBody, QueryParams};

const KIND: RecordKind = RecordKind::Documents;
const FILE_PART: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub(crate) const FIELD_TITLE: &str = "title";
pub(crate) const FIELD_FILE_NAME: &str = "fileName";
pub(crate) const FIELD_CONTENT_TYPE: &str = "contentType";
pub(crate) const FIELD_SIZE: &str = "size";
pub(crate) const FIELD_STORAGE_PATH: &str = "storagePath";
pub(crate) const FIELD_UPLOADED_AT: &str = "uploadedAt";

/// Set from the stored object; clients cannot overwrite them.
const BLOB_FIELDS: [&str; 5] = [
    FIELD_FILE_NAME,
    FIELD_CONTENT_TYPE,
    FIELD_SIZE,
    FIELD_STORAGE_PATH,
    FIELD_UPLOADED_AT,
];

pub(crate) fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/admin/documents",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/v1/admin/documents/:id",
            get(get_document)
                .put(update_document)
                .delete(delete_document),
        )
        .route("/v1/admin/documents/:id/download", get(download_document))
}

pub async fn list_documents(
    state: State<AppState>,
    query: QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Record>>> {
    records::list_records(KIND, state, query).await
}

pub async fn get_document(state: State<AppState>, id: Path<String>) -> ApiResult<Json<Record>> {
    records::get_record(KIND, state, id).await
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Bytes,
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Record>> {
    let mut fields = Fields::new();
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error("invalid multipart body", err))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == FILE_PART {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|err| multipart_error("failed to read file", err))?;
            file = Some(UploadedFile {
                file_name,
                content_type,
                data,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|err| multipart_error("invalid form field", err))?;
            fields.insert(name, Value::String(text));
        }
    }

    let file = file.ok_or_else(|| ApiError::missing_fields(vec![FILE_PART]))?;
    strip_managed_fields(&mut fields);
    for key in BLOB_FIELDS {
        fields.remove(key);
    }

    let file_name = storage::sanitize_file_name(&file.file_name);
    let path = storage::document_object_path(&file.file_name);
    let info = state
        .blobs
        .put(&path, &file.content_type, file.data)
        .await?;

    if records::is_blank(fields.get(FIELD_TITLE)) {
        fields.insert(FIELD_TITLE.to_string(), Value::String(file_name.clone()));
    }
    fields.insert(FIELD_FILE_NAME.to_string(), Value::String(file_name));
    fields.insert(
        FIELD_CONTENT_TYPE.to_string(),
        Value::String(info.content_type.clone()),
    );
    fields.insert(FIELD_SIZE.to_string(), Value::from(info.size));
    fields.insert(
        FIELD_STORAGE_PATH.to_string(),
        Value::String(info.path.clone()),
    );
    fields.insert(FIELD_UPLOADED_AT.to_string(), Value::String(now_rfc3339()));
    stamp_created(&mut fields);

    match state.store.create(KIND.collection(), fields).await {
        Ok(record) => {
            tracing::info!(
                id = %record.id,
                path = %info.path,
                size = info.size,
                "document uploaded"
            );
            Ok(Json(record))
        }
        Err(err) => {
            if let Err(cleanup) = state.blobs.delete(&info.path).await {
                tracing::warn!(path = %info.path, error = %cleanup, "orphaned upload left behind");
            }
            Err(err.into())
        }
    }
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Record>> {
    let mut fields = into_fields(payload)?;
    strip_managed_fields(&mut fields);
    for key in BLOB_FIELDS {
        fields.remove(key);
    }
    apply_update(KIND, &state, &id, fields).await.map(Json)
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let record = load_document(&state, &id).await?;
    let path = storage_path(&record)?;
    let download = state
        .blobs
        .open(path)
        .await?
        .ok_or_else(|| ApiError::not_found("document file not found"))?;

    let file_name = record
        .str_field(FIELD_FILE_NAME)
        .map(storage::sanitize_file_name)
        .unwrap_or_else(|| storage::sanitize_file_name(path));
    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_length = download.content_length;

    let mut response = Response::new(Body::from_stream(download.body));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_DISPOSITION, disposition);
    if let Some(length) = content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let record = load_document(&state, &id).await?;
    if let Some(path) = record.str_field(FIELD_STORAGE_PATH) {
        if !state.blobs.delete(path).await? {
            tracing::warn!(%id, path, "document file already missing");
        }
    }
    records::delete_record(KIND, State(state), Path(id)).await
}

async fn load_document(state: &AppState, id: &str) -> ApiResult<Record> {
    state
        .store
        .get(KIND.collection(), id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", KIND.label())))
}

fn storage_path(record: &Record) -> ApiResult<&str> {
    record
        .str_field(FIELD_STORAGE_PATH)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::not_found("document has no stored file"))
}

/// Keeps the 413 from the body limit; everything else is a malformed request.
fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            format!("{context}: {}", err.body_text()),
        )
    } else {
        ApiError::bad_request(format!("{context}: {}", err.body_text()))
    }
}
