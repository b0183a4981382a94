//! Service status
//!
//! Reports what the running instance has loaded: the canonical village set,
//! township aggregates, the size of the geocode cache and how many villages
//! carry live edits. An unreadable override table degrades the status instead
//! of failing the request.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::db::overrides;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the override tier cannot be read
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Canonical village keys (boundaries plus base records)
    pub villages: usize,
    pub townships: usize,
    pub cached_addresses: usize,
    /// Villages with a stored override; absent when the table is unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_villages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let edited_villages = match overrides::list_override_keys(&state.db).await {
        Ok(keys) => Some(keys.len()),
        Err(e) => {
            state
                .record_error(&format!("Failed to read overrides: {}", e))
                .await;
            None
        }
    };

    Json(HealthResponse {
        status: if edited_villages.is_some() { "ok" } else { "degraded" },
        module: "civmap-ingest",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        villages: state.canonical.len(),
        townships: state.townships.len(),
        cached_addresses: state.resolver.geocoder().cache_len().await,
        edited_villages,
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
