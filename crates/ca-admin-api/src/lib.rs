use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use ca_core::backends::{self, Backends};
use ca_core::community::CommunityError;
use ca_core::storage::{BlobError, BlobStore};
use ca_core::store::{DocumentStore, StoreError};
use ca_core::{config, http, logging, metrics, server};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;

mod communities;
mod documents;
mod openapi;
mod records;


pub(crate) const SERVICE_NAME: &str = "ca-admin-api";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }
}

impl From<Backends> for AppState {
    fn from(backends: Backends) -> Self {
        Self::new(backends.store, backends.blobs)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ErrorResponse {
    #[schema(value_type = String)]
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub(crate) fn missing_fields(missing: Vec<&'static str>) -> Self {
        Self::bad_request(format!("missing required fields: {}", missing.join(", ")))
            .with_details(serde_json::json!({ "missing": missing }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "document store failure");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", err.to_string())
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        tracing::error!(error = %err, "storage failure");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", err.to_string())
    }
}

impl From<CommunityError> for ApiError {
    fn from(err: CommunityError) -> Self {
        match err {
            CommunityError::NotFound(name) => {
                ApiError::not_found(format!("community not found: {name}"))
            }
            CommunityError::Store(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(payload)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), "INVALID_JSON", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(rejection.status(), "INVALID_QUERY", rejection.body_text())
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// `axum::Json` whose rejection is an [`ApiError`] body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonBody<T>(pub T);

/// `axum::extract::Query` whose rejection is an [`ApiError`] body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub(crate) struct QueryParams<T>(pub T);

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
}

pub struct AdminApiConfig {
    pub addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub backend: config::DataBackend,
}

pub fn load_config() -> Result<AdminApiConfig> {
    let addr = config::socket_addr_from_env("ADMIN_API_ADDR", "0.0.0.0:8081")?;
    let max_upload_bytes = config::parse_env("ADMIN_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
    let backend = backends::backend_from_env()?;
    Ok(AdminApiConfig {
        addr,
        max_upload_bytes,
        backend,
    })
}

pub async fn run(config: AdminApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let state = AppState::from(backends::connect(config.backend)?);
    let router = build_router(state, config.max_upload_bytes);
    server::serve(config.addr, router).await
}

/// Full router with the standard layers applied.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/v1/openapi.json", get(openapi_json))
        .merge(records::routes())
        .merge(communities::routes())
        .merge(documents::routes(max_upload_bytes))
        .with_state(state);

    let body_limit = max_upload_bytes.max(http::DEFAULT_BODY_LIMIT);
    http::apply_standard_layers(router, SERVICE_NAME, body_limit)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.check_ready().await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unavailable".into(),
                }),
            )
        }
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}

async fn openapi_json(headers: HeaderMap) -> impl IntoResponse {
    let server_url = openapi::infer_server_url(&headers);
    Json(openapi::document(server_url.as_deref()))
}
