//! Test Helper Utilities
//!
//! Shared fixtures for civmap-ingest integration tests: a table-driven
//! geocode provider, a small boundary dataset and resolver builders.

#![allow(dead_code)]

use async_trait::async_trait;
use civmap_common::GeoPoint;
use civmap_ingest::services::{
    AddressCache, BoundarySet, GeocodeProvider, GeocodingClient, LadderConfig, VillageResolver,
};
use civmap_ingest::IngestError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Inside 新竹縣_竹北市_北崙里
pub const BEILUN: GeoPoint = GeoPoint::new(24.83, 121.01);
/// Inside 新竹縣_竹北市_竹北里
pub const ZHUBEI: GeoPoint = GeoPoint::new(24.83, 121.03);
/// Inside the region but outside every fixture village
pub const NOWHERE: GeoPoint = GeoPoint::new(23.5, 120.5);

/// Provider answering from a fixed table, recording every query
#[derive(Default)]
pub struct TableProvider {
    known: HashMap<String, GeoPoint>,
    queries: Mutex<Vec<String>>,
}

impl TableProvider {
    pub fn new(entries: &[(&str, GeoPoint)]) -> Self {
        Self {
            known: entries.iter().map(|(k, p)| (k.to_string(), *p)).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeocodeProvider for TableProvider {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, IngestError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.known.get(query).copied())
    }
}

fn square_feature(county: &str, town: &str, village: &str, lng: f64, lat: f64) -> Value {
    let size = 0.02;
    json!({
        "type": "Feature",
        "properties": {
            "COUNTYNAME": county,
            "TOWNNAME": town,
            "VILLNAME": village,
            "VILLCODE": format!("{}-{}", town, village)
        },
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lng, lat],
                [lng + size, lat],
                [lng + size, lat + size],
                [lng, lat + size],
                [lng, lat]
            ]]
        }
    })
}

/// GeoJSON text of the fixture dataset
pub fn fixture_geojson() -> String {
    json!({
        "type": "FeatureCollection",
        "features": [
            square_feature("新竹縣", "竹北市", "北崙里", 121.00, 24.82),
            square_feature("新竹縣", "竹北市", "竹北里", 121.02, 24.82),
            square_feature("新竹縣", "橫山鄉", "橫山村", 121.10, 24.70),
            square_feature("新竹市", "東區", "光復里", 120.98, 24.78)
        ]
    })
    .to_string()
}

pub fn fixture_boundaries() -> BoundarySet {
    BoundarySet::from_geojson_str(&fixture_geojson()).unwrap()
}

/// Resolver over the fixture boundaries with a fast rate gate
pub fn resolver_with(provider: Arc<TableProvider>, cache: AddressCache) -> VillageResolver {
    let geocoder = GeocodingClient::new(
        provider,
        cache,
        Duration::from_millis(1),
        LadderConfig::new(["新竹縣", "新竹市"]),
    );
    VillageResolver::new(Arc::new(geocoder), Arc::new(fixture_boundaries()))
}
