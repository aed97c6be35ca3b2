use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use ca_core::collections::{
    RecordKind, FIELD_COMMUNITY, FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT,
};
use ca_core::community::{self, CommunityIdentity};
use ca_core::store::{Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{ApiError, ApiResult, AppState, JsonBody, QueryParams};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub community: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub status: String,
    pub id: String,
}

pub(crate) fn routes() -> Router<AppState> {
    let mut router = Router::new();
    for kind in RecordKind::GENERIC {
        let collection_path = format!("/v1/admin/{}", kind.route_segment());
        let record_path = format!("{collection_path}/:id");
        router = router
            .route(
                &collection_path,
                get(move |state: State<AppState>, query: QueryParams<ListQuery>| {
                    list_records(kind, state, query)
                })
                .post(move |state: State<AppState>, body: JsonBody<Value>| {
                    create_record(kind, state, body)
                }),
            )
            .route(
                &record_path,
                get(move |state: State<AppState>, id: Path<String>| get_record(kind, state, id))
                    .put(
                        move |state: State<AppState>,
                              id: Path<String>,
                              body: JsonBody<Value>| {
                            update_record(kind, state, id, body)
                        },
                    )
                    .delete(move |state: State<AppState>, id: Path<String>| {
                        delete_record(kind, state, id)
                    }),
            );
    }
    router
}

pub(crate) async fn list_records(
    kind: RecordKind,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Record>>> {
    let mut records = state.store.list(kind.collection()).await?;

    if let Some(filter) = query
        .community
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let identity = community::lookup_community(state.store.as_ref(), filter)
            .await?
            .map(|record| CommunityIdentity::from_record(&record));
        let filter_norm = community::normalize_community_name(filter);
        records.retain(|record| {
            let Some(value) = record.str_field(FIELD_COMMUNITY) else {
                return false;
            };
            match &identity {
                Some(identity) => identity.matches(value),
                None => community::normalize_community_name(value) == filter_norm,
            }
        });
    }

    if let Some(limit) = query.limit {
        records.truncate(limit);
    }

    Ok(Json(records))
}

pub(crate) async fn get_record(
    kind: RecordKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Record>> {
    let record = state
        .store
        .get(kind.collection(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.label())))?;
    Ok(Json(record))
}

async fn create_record(
    kind: RecordKind,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Record>> {
    let mut fields = into_fields(payload)?;
    strip_managed_fields(&mut fields);
    require_fields(kind, &fields)?;
    stamp_created(&mut fields);

    let record = state.store.create(kind.collection(), fields).await?;
    tracing::info!(collection = kind.collection(), id = %record.id, "record created");
    Ok(Json(record))
}

async fn update_record(
    kind: RecordKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Record>> {
    let mut fields = into_fields(payload)?;
    strip_managed_fields(&mut fields);
    apply_update(kind, &state, &id, fields).await.map(Json)
}

pub(crate) async fn delete_record(
    kind: RecordKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.store.delete(kind.collection(), &id).await? {
        return Err(ApiError::not_found(format!("{} not found", kind.label())));
    }
    tracing::info!(collection = kind.collection(), %id, "record deleted");
    Ok(Json(DeleteResponse {
        status: "deleted".into(),
        id,
    }))
}

/// Shared tail of every PUT: reject empty patches, stamp, merge, 404 on miss.
pub(crate) async fn apply_update(
    kind: RecordKind,
    state: &AppState,
    id: &str,
    mut fields: Fields,
) -> ApiResult<Record> {
    if fields.is_empty() {
        return Err(ApiError::bad_request("no updatable fields in request body"));
    }
    fields.insert(FIELD_UPDATED_AT.to_string(), Value::String(now_rfc3339()));

    let record = state
        .store
        .update(kind.collection(), id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.label())))?;
    tracing::info!(collection = kind.collection(), %id, "record updated");
    Ok(record)
}

pub(crate) fn into_fields(payload: Value) -> ApiResult<Fields> {
    match payload {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::bad_request("request body must be a JSON object")),
    }
}

/// Drops keys the server owns: the document key and the timestamps.
pub(crate) fn strip_managed_fields(fields: &mut Fields) {
    fields.remove(FIELD_ID);
    fields.remove(FIELD_CREATED_AT);
    fields.remove(FIELD_UPDATED_AT);
}

pub(crate) fn require_fields(kind: RecordKind, fields: &Fields) -> ApiResult<()> {
    let missing: Vec<&'static str> = kind
        .required_fields()
        .iter()
        .copied()
        .filter(|name| is_blank(fields.get(*name)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::missing_fields(missing))
    }
}

pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

pub(crate) fn stamp_created(fields: &mut Fields) {
    let now = Value::String(now_rfc3339());
    fields.insert(FIELD_CREATED_AT.to_string(), now.clone());
    fields.insert(FIELD_UPDATED_AT.to_string(), now);
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
