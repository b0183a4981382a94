//! Address resolution endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::services::village_resolver::ResolvedVillage;
use crate::{ApiError, ApiResult, AppState};

/// Request payload for address resolution
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub address: String,
}

/// POST /api/resolve
///
/// **Request:** `{"address": "新竹縣竹北市文興路100號4樓"}`
/// **Response:** `{"villageKey": "新竹縣_竹北市_...", "point": {"lat": .., "lng": ..}}`
///
/// **Errors:**
/// - 400 Bad Request: blank address
/// - 422 Unprocessable Entity: no candidate geocoded, or the point lies in
///   no known village
pub async fn resolve_address(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> ApiResult<Json<ResolvedVillage>> {
    if payload.address.trim().is_empty() {
        return Err(ApiError::BadRequest("address cannot be empty".to_string()));
    }

    let resolved = state
        .resolver
        .resolve_address_to_village(&payload.address)
        .await?;

    tracing::info!(
        address = %payload.address,
        village = %resolved.village_key,
        "Resolved address via API"
    );
    Ok(Json(resolved))
}

pub fn resolve_routes() -> Router<AppState> {
    Router::new().route("/api/resolve", post(resolve_address))
}
