//! Township aggregate endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::services::boundary_aggregator::TownshipAggregate;
use crate::AppState;

/// GET /api/townships
///
/// Hull and label per `{county}_{town}`, ordered by key. Computed once at
/// startup from the immutable boundary set.
pub async fn list_townships(State(state): State<AppState>) -> Json<Vec<TownshipAggregate>> {
    Json(state.townships.as_ref().clone())
}

pub fn township_routes() -> Router<AppState> {
    Router::new().route("/api/townships", get(list_townships))
}
