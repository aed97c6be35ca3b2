#![allow(dead_code)]

use axum::http::HeaderMap;
use serde::Serialize;
use utoipa::openapi::server::ServerBuilder;
use utoipa::{OpenApi, ToSchema};

use crate::communities::{
    AssociateRequest, AssociateResponse, CollectionCountsResponse, CommunityIdentityResponse,
};
use crate::records::DeleteResponse;
use crate::{ErrorResponse, HealthStatus};

/// Multipart form accepted by the document upload route.
#[derive(Serialize, ToSchema)]
pub struct DocumentUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub title: Option<String>,
    pub community: Option<String>,
    pub description: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz_doc,
        metrics_doc,
        openapi_doc,
        users_list_doc,
        users_create_doc,
        users_get_doc,
        users_update_doc,
        users_delete_doc,
        posts_list_doc,
        posts_create_doc,
        posts_get_doc,
        posts_update_doc,
        posts_delete_doc,
        news_list_doc,
        news_create_doc,
        news_get_doc,
        news_update_doc,
        news_delete_doc,
        businesses_list_doc,
        businesses_create_doc,
        businesses_get_doc,
        businesses_update_doc,
        businesses_delete_doc,
        resources_list_doc,
        resources_create_doc,
        resources_get_doc,
        resources_update_doc,
        resources_delete_doc,
        resource_content_list_doc,
        resource_content_create_doc,
        resource_content_get_doc,
        resource_content_update_doc,
        resource_content_delete_doc,
        communities_list_doc,
        communities_create_doc,
        communities_get_doc,
        communities_update_doc,
        communities_delete_doc,
        communities_resolve_doc,
        communities_lookup_doc,
        communities_members_doc,
        communities_associate_doc,
        documents_list_doc,
        documents_upload_doc,
        documents_get_doc,
        documents_update_doc,
        documents_download_doc,
        documents_delete_doc
    ),
    components(
        schemas(
            HealthStatus,
            ErrorResponse,
            DeleteResponse,
            CommunityIdentityResponse,
            AssociateRequest,
            AssociateResponse,
            CollectionCountsResponse,
            DocumentUploadForm
        )
    ),
    tags(
        (name = "admin-api", description = "Community admin dashboard API")
    )
)]
pub struct AdminApiDoc;

pub fn document(server_url: Option<&str>) -> utoipa::openapi::OpenApi {
    let mut doc = AdminApiDoc::openapi();
    if let Some(url) = server_url {
        doc.servers = Some(vec![ServerBuilder::new().url(url).build()]);
    }
    doc
}

pub fn infer_server_url(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|value| value.to_str().ok())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{proto}://{host}"))
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, body = HealthStatus), (status = 503, body = HealthStatus))
)]
fn healthz_doc() {}

#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, content_type = "text/plain", body = String))
)]
fn metrics_doc() {}

#[utoipa::path(
    get,
    path = "/v1/openapi.json",
    responses((status = 200, body = serde_json::Value))
)]
fn openapi_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn users_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/users",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn users_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}",
    params(("id" = String, Path, description = "User document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn users_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}",
    params(("id" = String, Path, description = "User document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn users_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    params(("id" = String, Path, description = "User document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn users_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/posts",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn posts_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/posts",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn posts_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/posts/{id}",
    params(("id" = String, Path, description = "Post document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn posts_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/posts/{id}",
    params(("id" = String, Path, description = "Post document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn posts_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/posts/{id}",
    params(("id" = String, Path, description = "Post document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn posts_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/news",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn news_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/news",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn news_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/news/{id}",
    params(("id" = String, Path, description = "News item document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn news_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/news/{id}",
    params(("id" = String, Path, description = "News item document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn news_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/news/{id}",
    params(("id" = String, Path, description = "News item document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn news_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/businesses",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn businesses_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/businesses",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn businesses_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/businesses/{id}",
    params(("id" = String, Path, description = "Business document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn businesses_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/businesses/{id}",
    params(("id" = String, Path, description = "Business document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn businesses_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/businesses/{id}",
    params(("id" = String, Path, description = "Business document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn businesses_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/resources",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn resources_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/resources",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn resources_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/resources/{id}",
    params(("id" = String, Path, description = "Resource document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn resources_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/resources/{id}",
    params(("id" = String, Path, description = "Resource document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn resources_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/resources/{id}",
    params(("id" = String, Path, description = "Resource document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn resources_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/resource-content",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn resource_content_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/resource-content",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn resource_content_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/resource-content/{id}",
    params(("id" = String, Path, description = "Resource content document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn resource_content_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/resource-content/{id}",
    params(("id" = String, Path, description = "Resource content document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn resource_content_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/resource-content/{id}",
    params(("id" = String, Path, description = "Resource content document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn resource_content_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/communities",
    params(("limit" = Option<usize>, Query, description = "Maximum records returned")),
    responses((status = 200, body = [serde_json::Value]))
)]
fn communities_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/communities",
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn communities_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/communities/{id}",
    params(("id" = String, Path, description = "Community document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn communities_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/communities/{id}",
    params(("id" = String, Path, description = "Community document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn communities_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/communities/{id}",
    params(("id" = String, Path, description = "Community document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn communities_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/communities/resolve",
    params(("name" = String, Query, description = "Community display name, any spelling")),
    responses(
        (status = 200, body = CommunityIdentityResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn communities_resolve_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/communities/lookup",
    params(("identifier" = String, Query, description = "Document id, formatted id or name")),
    responses(
        (status = 200, body = CommunityIdentityResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn communities_lookup_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/communities/{id}/members",
    params(("id" = String, Path, description = "Community document id, formatted id or name")),
    responses((status = 200, body = [serde_json::Value]), (status = 404, body = ErrorResponse))
)]
fn communities_members_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/communities/associate",
    request_body = AssociateRequest,
    responses(
        (status = 200, body = AssociateResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse)
    )
)]
fn communities_associate_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/documents",
    params(
        ("community" = Option<String>, Query, description = "Community name or identifier"),
        ("limit" = Option<usize>, Query, description = "Maximum records returned")
    ),
    responses((status = 200, body = [serde_json::Value]))
)]
fn documents_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/admin/documents",
    request_body(content = DocumentUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 413, description = "Upload exceeds the configured size limit")
    )
)]
fn documents_upload_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn documents_get_doc() {}

#[utoipa::path(
    put,
    path = "/v1/admin/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn documents_update_doc() {}

#[utoipa::path(
    get,
    path = "/v1/admin/documents/{id}/download",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, content_type = "application/octet-stream", body = String),
        (status = 404, body = ErrorResponse)
    )
)]
fn documents_download_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/admin/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses((status = 200, body = DeleteResponse), (status = 404, body = ErrorResponse))
)]
fn documents_delete_doc() {}
