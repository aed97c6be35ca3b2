//! Community identity resolution and the association sweep.
//!
//! Records across the app refer to their community by display name, and the
//! names drifted over time (case, stray punctuation, doubled spaces). The sweep
//! scans each collection in full and rewrites every record whose community
//! normalizes to the target back to the canonical display name. Nothing here
//! is transactional: a failed write aborts the sweep and leaves earlier writes
//! in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::collections::{
    ASSOCIATION_COLLECTIONS, COMMUNITIES, FIELD_COMMUNITY, FIELD_FAVORITE_COMMUNITIES,
    FIELD_FORMATTED_ID, FIELD_ID, FIELD_NAME, USERS,
};
use crate::store::{DocumentStore, Fields, Record, StoreError};

#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("community not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Every identifier a community may be referenced by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityIdentity {
    pub document_id: String,
    pub name: String,
    pub formatted_id: Option<String>,
    pub all_possible_ids: Vec<String>,
}

impl CommunityIdentity {
    pub fn from_record(record: &Record) -> Self {
        let name = record.str_field(FIELD_NAME).unwrap_or_default().to_string();
        let formatted_id = record
            .str_field(FIELD_FORMATTED_ID)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| formatted_community_id(&name));

        let mut all_possible_ids = vec![record.id.clone()];
        let explicit_id = record
            .str_field(FIELD_ID)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        for candidate in [formatted_id.as_deref(), explicit_id].into_iter().flatten() {
            if !all_possible_ids.iter().any(|existing| existing == candidate) {
                all_possible_ids.push(candidate.to_string());
            }
        }

        Self {
            document_id: record.id.clone(),
            name,
            formatted_id,
            all_possible_ids,
        }
    }

    /// True when a stored `community` value refers to this community.
    pub fn matches(&self, value: &str) -> bool {
        let normalized = normalize_community_name(value);
        if normalized.is_empty() {
            return false;
        }
        normalized == normalize_community_name(&self.name)
            || self.all_possible_ids.iter().any(|id| id == value.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AssociationOptions {
    #[serde(default)]
    pub include_unaffiliated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub scanned: u64,
    pub matched: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationReport {
    pub community: String,
    pub identifiers: Vec<String>,
    pub collections: BTreeMap<String, CollectionCounts>,
    pub unaffiliated_assigned: u64,
    pub total_updated: u64,
}

/// Lowercase, trim, drop apostrophes/periods/quotes, collapse whitespace runs.
pub fn normalize_community_name(value: &str) -> String {
    let stripped: String = value
        .chars()
        .filter(|ch| !is_stripped_punctuation(*ch))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_stripped_punctuation(ch: char) -> bool {
    matches!(
        ch,
        '\'' | '\u{2018}' | '\u{2019}' | '.' | '"' | '\u{201C}' | '\u{201D}'
    )
}

/// Slug form of a display name, e.g. `elsipogtog-first-nation`. `None` when nothing survives.
pub fn formatted_community_id(name: &str) -> Option<String> {
    let normalized = normalize_community_name(name);
    let mut slug = String::with_capacity(normalized.len());
    let mut pending_dash = false;
    for ch in normalized.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Empty, null, missing, or the literal string `"null"`.
pub fn is_unaffiliated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
        }
        Some(_) => false,
    }
}

/// Exact name lookup first, then a full scan on normalized names.
pub async fn find_community_by_name(
    store: &dyn DocumentStore,
    name: &str,
) -> Result<Option<Record>, StoreError> {
    let exact = store
        .find_by_field(COMMUNITIES, FIELD_NAME, &Value::String(name.to_string()))
        .await?;
    if let Some(record) = exact.into_iter().next() {
        return Ok(Some(record));
    }

    let target = normalize_community_name(name);
    if target.is_empty() {
        return Ok(None);
    }
    let all = store.list(COMMUNITIES).await?;
    Ok(all.into_iter().find(|record| {
        record
            .str_field(FIELD_NAME)
            .map(|candidate| normalize_community_name(candidate) == target)
            .unwrap_or(false)
    }))
}

pub async fn resolve_community_identity(
    store: &dyn DocumentStore,
    name: &str,
) -> Result<Option<CommunityIdentity>, StoreError> {
    Ok(find_community_by_name(store, name)
        .await?
        .map(|record| CommunityIdentity::from_record(&record)))
}

/// Accepts a document id, a formatted id, or any name variant.
pub async fn lookup_community(
    store: &dyn DocumentStore,
    identifier: &str,
) -> Result<Option<Record>, StoreError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Ok(None);
    }
    if !identifier.contains('/') {
        if let Some(record) = store.get(COMMUNITIES, identifier).await? {
            return Ok(Some(record));
        }
    }
    let by_code = store
        .find_by_field(
            COMMUNITIES,
            FIELD_FORMATTED_ID,
            &Value::String(identifier.to_string()),
        )
        .await?;
    if let Some(record) = by_code.into_iter().next() {
        return Ok(Some(record));
    }
    find_community_by_name(store, identifier).await
}

/// Users referencing the community directly or through `favoriteCommunities`.
pub async fn list_members(
    store: &dyn DocumentStore,
    identity: &CommunityIdentity,
) -> Result<Vec<Record>, StoreError> {
    let users = store.list(USERS).await?;
    Ok(users
        .into_iter()
        .filter(|user| {
            let direct = user
                .str_field(FIELD_COMMUNITY)
                .map(|value| identity.matches(value))
                .unwrap_or(false);
            direct
                || favorite_ids(user)
                    .iter()
                    .any(|id| identity.all_possible_ids.contains(id))
        })
        .collect())
}

pub async fn associate_community(
    store: &dyn DocumentStore,
    name: &str,
    options: AssociationOptions,
) -> Result<AssociationReport, CommunityError> {
    let identity = resolve_community_identity(store, name)
        .await?
        .ok_or_else(|| CommunityError::NotFound(name.trim().to_string()))?;

    tracing::info!(
        community = %identity.name,
        identifiers = ?identity.all_possible_ids,
        include_unaffiliated = options.include_unaffiliated,
        "association sweep started"
    );

    let mut report = AssociationReport {
        community: identity.name.clone(),
        identifiers: identity.all_possible_ids.clone(),
        collections: BTreeMap::new(),
        unaffiliated_assigned: 0,
        total_updated: 0,
    };

    for collection in ASSOCIATION_COLLECTIONS {
        let records = store.list(collection).await?;
        let mut counts = CollectionCounts::default();

        for record in records {
            counts.scanned += 1;
            let current = record.fields.get(FIELD_COMMUNITY);
            let matched = current
                .and_then(Value::as_str)
                .map(|value| identity.matches(value))
                .unwrap_or(false);
            let adopt = collection == USERS
                && !matched
                && options.include_unaffiliated
                && is_unaffiliated(current);
            if !matched && !adopt {
                continue;
            }
            counts.matched += 1;
            if adopt {
                report.unaffiliated_assigned += 1;
            }

            let mut patch = Fields::new();
            if current.and_then(Value::as_str) != Some(identity.name.as_str()) {
                patch.insert(
                    FIELD_COMMUNITY.to_string(),
                    Value::String(identity.name.clone()),
                );
            }
            if collection == USERS {
                if let Some(favorites) = merged_favorites(&record, &identity.all_possible_ids) {
                    patch.insert(FIELD_FAVORITE_COMMUNITIES.to_string(), favorites);
                }
            }
            if patch.is_empty() {
                continue;
            }

            store.update(collection, &record.id, patch).await?;
            counts.updated += 1;
        }

        tracing::info!(
            collection,
            scanned = counts.scanned,
            matched = counts.matched,
            updated = counts.updated,
            "association sweep collection done"
        );
        report.total_updated += counts.updated;
        report.collections.insert(collection.to_string(), counts);
    }

    Ok(report)
}

fn favorite_ids(record: &Record) -> Vec<String> {
    match record.fields.get(FIELD_FAVORITE_COMMUNITIES) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Existing favorites plus any missing identifiers; `None` when nothing would change.
///
/// A non-array value is rewritten as an array; a non-blank string scalar is kept
/// as its first entry.
fn merged_favorites(record: &Record, identifiers: &[String]) -> Option<Value> {
    let (mut merged, mut changed) = match record.fields.get(FIELD_FAVORITE_COMMUNITIES) {
        Some(Value::Array(items)) => (items.clone(), false),
        Some(Value::String(single)) if !single.trim().is_empty() => {
            (vec![Value::String(single.clone())], true)
        }
        _ => (Vec::new(), true),
    };
    for id in identifiers {
        let present = merged.iter().any(|item| item.as_str() == Some(id.as_str()));
        if !present {
            merged.push(Value::String(id.clone()));
            changed = true;
        }
    }
    if changed {
        Some(Value::Array(merged))
    } else {
        None
    }
}
