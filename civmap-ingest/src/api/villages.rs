//! Village record endpoints
//!
//! Records are always served merged (base tier + override tier). Edits are
//! sanitized and folded into the stored override, and can be dropped again
//! as a whole. The base tier is never touched from here.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use civmap_common::VillageKey;
use serde_json::Value;

use crate::db::overrides;
use crate::models::community_record::{MergedRecord, RecordPatch};
use crate::services::record_reconciler::merge;
use crate::services::record_sanitizer::sanitize_patch;
use crate::{ApiError, ApiResult, AppState};

fn parse_key(raw: &str) -> ApiResult<VillageKey> {
    raw.parse::<VillageKey>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn merged_record(state: &AppState, key: &VillageKey) -> ApiResult<MergedRecord> {
    let base = match state.store.load(key) {
        Ok(base) => base,
        Err(e) => {
            let message = format!("Failed to load base record {}: {}", key, e);
            state.record_error(&message).await;
            return Err(ApiError::Internal(message));
        }
    };
    let patch = overrides::get_override(&state.db, key).await?;

    if base.is_none() && patch.is_none() && !state.canonical.contains(key) {
        return Err(ApiError::NotFound(format!("village {}", key)));
    }

    Ok(merge(
        &base.unwrap_or_default(),
        &patch.unwrap_or_default(),
    ))
}

/// GET /api/villages/:key
///
/// **Errors:**
/// - 400 Bad Request: key is not `{county}_{town}_{village}`
/// - 404 Not Found: unknown village with no stored data
pub async fn get_village(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> ApiResult<Json<MergedRecord>> {
    let key = parse_key(&raw_key)?;
    Ok(Json(merged_record(&state, &key).await?))
}

/// PATCH /api/villages/:key
///
/// **Request:** partial record; absent fields are left untouched
/// **Response:** the merged record after the edit
pub async fn patch_village(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<MergedRecord>> {
    let key = parse_key(&raw_key)?;
    if !state.canonical.contains(&key) {
        return Err(ApiError::NotFound(format!("village {}", key)));
    }

    let edit: RecordPatch = sanitize_patch(&body)?;
    overrides::apply_edit(&state.db, &key, edit).await?;

    tracing::info!(village = %key, "Village record edited");
    Ok(Json(merged_record(&state, &key).await?))
}

/// DELETE /api/villages/:key
///
/// Drops every live edit of the village.
/// **Response:** the record as the base tier alone has it
///
/// **Errors:**
/// - 404 Not Found: the village has no stored edits
pub async fn revert_village(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> ApiResult<Json<MergedRecord>> {
    let key = parse_key(&raw_key)?;
    if !overrides::delete_override(&state.db, &key).await? {
        return Err(ApiError::NotFound(format!("no edits for village {}", key)));
    }

    tracing::info!(village = %key, "Village edits reverted");
    Ok(Json(merged_record(&state, &key).await?))
}

pub fn village_routes() -> Router<AppState> {
    Router::new().route(
        "/api/villages/:key",
        get(get_village).patch(patch_village).delete(revert_village),
    )
}
