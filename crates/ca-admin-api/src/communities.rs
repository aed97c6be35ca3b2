use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use ca_core::collections::{RecordKind, FIELD_FORMATTED_ID, FIELD_NAME};
use ca_core::community::{
    self, AssociationOptions, AssociationReport, CollectionCounts, CommunityIdentity,
};
use ca_core::metrics;
use ca_core::store::{Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::records::{
    self, apply_update, into_fields, is_blank, require_fields, stamp_created, DeleteResponse,
    ListQuery,
};
use crate::{ApiError, ApiResult, AppState, JsonBody, QueryParams, SERVICE_NAME};

const KIND: RecordKind = RecordKind::Communities;

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub identifier: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CommunityIdentityResponse {
    pub document_id: String,
    pub name: String,
    pub formatted_id: Option<String>,
    pub all_possible_ids: Vec<String>,
}

impl From<CommunityIdentity> for CommunityIdentityResponse {
    fn from(identity: CommunityIdentity) -> Self {
        Self {
            document_id: identity.document_id,
            name: identity.name,
            formatted_id: identity.formatted_id,
            all_possible_ids: identity.all_possible_ids,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AssociateRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub include_unaffiliated: bool,
}

#[derive(Serialize, ToSchema)]
pub struct CollectionCountsResponse {
    pub scanned: u64,
    pub matched: u64,
    pub updated: u64,
}

impl From<CollectionCounts> for CollectionCountsResponse {
    fn from(counts: CollectionCounts) -> Self {
        Self {
            scanned: counts.scanned,
            matched: counts.matched,
            updated: counts.updated,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AssociateResponse {
    pub community: String,
    pub identifiers: Vec<String>,
    pub collections: BTreeMap<String, CollectionCountsResponse>,
    pub unaffiliated_assigned: u64,
    pub total_updated: u64,
}

impl From<AssociationReport> for AssociateResponse {
    fn from(report: AssociationReport) -> Self {
        Self {
            community: report.community,
            identifiers: report.identifiers,
            collections: report
                .collections
                .into_iter()
                .map(|(collection, counts)| (collection, counts.into()))
                .collect(),
            unaffiliated_assigned: report.unaffiliated_assigned,
            total_updated: report.total_updated,
        }
    }
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/admin/communities",
            get(list_communities).post(create_community),
        )
        .route("/v1/admin/communities/resolve", get(resolve_community))
        .route("/v1/admin/communities/lookup", get(lookup_community))
        .route("/v1/admin/communities/associate", post(associate_community))
        .route(
            "/v1/admin/communities/:id",
            get(get_community)
                .put(update_community)
                .delete(delete_community),
        )
        .route("/v1/admin/communities/:id/members", get(list_members))
}

pub async fn list_communities(
    state: State<AppState>,
    query: QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Record>>> {
    records::list_records(KIND, state, query).await
}

pub async fn get_community(state: State<AppState>, id: Path<String>) -> ApiResult<Json<Record>> {
    records::get_record(KIND, state, id).await
}

pub async fn delete_community(
    state: State<AppState>,
    id: Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    records::delete_record(KIND, state, id).await
}

pub async fn create_community(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Record>> {
    let mut fields = into_fields(payload)?;
    // An `id` sent on create is kept as the community's explicit identifier.
    fields.remove("createdAt");
    fields.remove("updatedAt");
    if is_blank(fields.get("id")) {
        fields.remove("id");
    }
    require_fields(KIND, &fields)?;

    let name = trimmed_name(&fields)?;
    ensure_name_available(&state, &name, None).await?;
    fields.insert(FIELD_NAME.to_string(), Value::String(name.clone()));

    if is_blank(fields.get(FIELD_FORMATTED_ID)) {
        match community::formatted_community_id(&name) {
            Some(formatted) => {
                fields.insert(FIELD_FORMATTED_ID.to_string(), Value::String(formatted));
            }
            None => {
                fields.remove(FIELD_FORMATTED_ID);
            }
        }
    }
    stamp_created(&mut fields);

    let record = state.store.create(KIND.collection(), fields).await?;
    tracing::info!(id = %record.id, name = %name, "community created");
    Ok(Json(record))
}

pub async fn update_community(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Record>> {
    let mut fields = into_fields(payload)?;
    records::strip_managed_fields(&mut fields);

    if fields.contains_key(FIELD_NAME) {
        if is_blank(fields.get(FIELD_NAME)) {
            return Err(ApiError::missing_fields(vec![FIELD_NAME]));
        }
        let name = trimmed_name(&fields)?;
        ensure_name_available(&state, &name, Some(&id)).await?;
        fields.insert(FIELD_NAME.to_string(), Value::String(name));
    }

    apply_update(KIND, &state, &id, fields).await.map(Json)
}

pub async fn resolve_community(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ResolveQuery>,
) -> ApiResult<Json<CommunityIdentityResponse>> {
    let name = required_param(query.name, "name")?;
    let identity = community::resolve_community_identity(state.store.as_ref(), &name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("community not found: {}", name.trim())))?;
    Ok(Json(identity.into()))
}

pub async fn lookup_community(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LookupQuery>,
) -> ApiResult<Json<CommunityIdentityResponse>> {
    let identifier = required_param(query.identifier, "identifier")?;
    let record = community::lookup_community(state.store.as_ref(), &identifier)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("community not found: {}", identifier.trim()))
        })?;
    Ok(Json(CommunityIdentity::from_record(&record).into()))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Record>>> {
    let record = community::lookup_community(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("community not found"))?;
    let identity = CommunityIdentity::from_record(&record);
    let members = community::list_members(state.store.as_ref(), &identity).await?;
    Ok(Json(members))
}

pub async fn associate_community(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<AssociateRequest>,
) -> ApiResult<Json<AssociateResponse>> {
    let name = required_param(payload.name, "name")?;
    let options = AssociationOptions {
        include_unaffiliated: payload.include_unaffiliated,
    };

    match community::associate_community(state.store.as_ref(), &name, options).await {
        Ok(report) => {
            metrics::inc_association_sweep(SERVICE_NAME, metrics::SWEEP_RESULT_SUCCESS);
            for (collection, counts) in &report.collections {
                metrics::add_association_updates(SERVICE_NAME, collection, counts.updated);
            }
            tracing::info!(
                community = %report.community,
                total_updated = report.total_updated,
                unaffiliated_assigned = report.unaffiliated_assigned,
                "association sweep finished"
            );
            Ok(Json(report.into()))
        }
        Err(err) => {
            metrics::inc_association_sweep(SERVICE_NAME, metrics::SWEEP_RESULT_ERROR);
            Err(err.into())
        }
    }
}

fn required_param(value: Option<String>, name: &'static str) -> ApiResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::missing_fields(vec![name])),
    }
}

fn trimmed_name(fields: &Fields) -> ApiResult<String> {
    fields
        .get(FIELD_NAME)
        .and_then(Value::as_str)
        .map(|name| name.trim().to_string())
        .ok_or_else(|| ApiError::bad_request("name must be a string"))
}

/// 409 when another community already normalizes to the same name.
async fn ensure_name_available(
    state: &AppState,
    name: &str,
    current_id: Option<&str>,
) -> ApiResult<()> {
    if let Some(existing) = community::find_community_by_name(state.store.as_ref(), name).await? {
        if Some(existing.id.as_str()) != current_id {
            return Err(ApiError::conflict(format!(
                "community already exists: {}",
                existing.str_field(FIELD_NAME).unwrap_or(name)
            ))
            .with_details(serde_json::json!({ "id": existing.id })));
        }
    }
    Ok(())
}
