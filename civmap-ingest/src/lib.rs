//! civmap-ingest library interface
//!
//! Address resolution, record reconciliation and batch enrichment for
//! village community records. Exposed as a library for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult, IngestError};

use axum::Router;
use chrono::{DateTime, Utc};
use civmap_common::VillageKey;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::db::BaseRecordStore;
use crate::services::boundary_aggregator::{aggregate_townships, TownshipAggregate};
use crate::services::village_resolver::VillageResolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Override tier
    pub db: SqlitePool,
    /// Base tier
    pub store: BaseRecordStore,
    /// Geocoder and boundary set
    pub resolver: VillageResolver,
    /// Boundary keys plus base record keys
    pub canonical: Arc<BTreeSet<VillageKey>>,
    /// Township aggregates, computed once
    pub townships: Arc<Vec<TownshipAggregate>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, store: BaseRecordStore, resolver: VillageResolver) -> Self {
        let mut canonical = resolver.boundaries().keys();
        canonical.extend(store.keys());
        let townships = aggregate_townships(resolver.boundaries());

        Self {
            db,
            store,
            resolver,
            canonical: Arc::new(canonical),
            townships: Arc::new(townships),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: &str) {
        tracing::error!("{}", message);
        *self.last_error.write().await = Some(message.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::village_routes())
        .merge(api::resolve_routes())
        .merge(api::township_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
