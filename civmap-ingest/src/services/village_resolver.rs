//! Address → village resolution via geocoding and boundary matching

use civmap_common::{GeoPoint, VillageKey};
use serde::Serialize;
use std::sync::Arc;

use super::geocoding_client::GeocodingClient;
use super::polygon_matcher::BoundarySet;
use crate::error::IngestError;

/// Village an address resolved to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVillage {
    pub village_key: VillageKey,
    pub point: GeoPoint,
}

/// Geocoder plus boundary set
#[derive(Clone)]
pub struct VillageResolver {
    geocoder: Arc<GeocodingClient>,
    boundaries: Arc<BoundarySet>,
}

impl VillageResolver {
    pub fn new(geocoder: Arc<GeocodingClient>, boundaries: Arc<BoundarySet>) -> Self {
        Self {
            geocoder,
            boundaries,
        }
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    pub fn geocoder(&self) -> &GeocodingClient {
        &self.geocoder
    }

    /// Geocode `address` and find the enclosing village
    pub async fn resolve_address_to_village(
        &self,
        address: &str,
    ) -> Result<ResolvedVillage, IngestError> {
        let resolution = self.geocoder.resolve(address).await?;

        match self.boundaries.locate(resolution.point) {
            Some(key) => Ok(ResolvedVillage {
                village_key: key.clone(),
                point: resolution.point,
            }),
            None => Err(IngestError::NoEnclosingPolygon {
                address: address.trim().to_string(),
                point: resolution.point,
            }),
        }
    }
}
