//! Village boundary set and point-in-polygon matching
//!
//! Boundaries come from a GeoJSON FeatureCollection whose features carry
//! `COUNTYNAME`, `TOWNNAME`, `VILLNAME` and `VILLCODE` properties. Only the
//! outer ring of each polygon is kept; holes are not modeled.
//!
//! Matching is even-odd ray casting with a half-open edge rule: a point on a
//! left or bottom edge counts as inside, a point on a right or top edge as
//! outside. Adjacent villages sharing an edge therefore never both claim it.

use civmap_common::{GeoPoint, VillageKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::IngestError;

/// Closed or open sequence of vertices; the closing edge is implied
pub type Ring = Vec<GeoPoint>;

/// Outer-ring geometry of one village
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryGeometry {
    Polygon(Ring),
    /// Constituent outer rings in dataset order
    MultiPolygon(Vec<Ring>),
}

impl BoundaryGeometry {
    pub fn outer_rings(&self) -> &[Ring] {
        match self {
            BoundaryGeometry::Polygon(ring) => std::slice::from_ref(ring),
            BoundaryGeometry::MultiPolygon(rings) => rings,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.outer_rings()
            .iter()
            .any(|ring| point_in_ring(point, ring))
    }

    /// Parse a GeoJSON geometry object, keeping outer rings only
    pub fn from_geojson(geometry: &Value, feature: usize) -> Result<Self, IngestError> {
        let malformed = |reason: String| IngestError::MalformedBoundaryGeometry { feature, reason };

        let kind = geometry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("geometry has no type".to_string()))?;
        let coordinates = geometry
            .get("coordinates")
            .ok_or_else(|| malformed("geometry has no coordinates".to_string()))?;

        match kind {
            "Polygon" => {
                let rings: Vec<Vec<[f64; 2]>> = serde_json::from_value(coordinates.clone())
                    .map_err(|e| malformed(format!("bad Polygon coordinates: {}", e)))?;
                let outer = outer_ring(rings).ok_or_else(|| malformed("empty Polygon".to_string()))?;
                Ok(BoundaryGeometry::Polygon(outer))
            }
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<[f64; 2]>>> =
                    serde_json::from_value(coordinates.clone())
                        .map_err(|e| malformed(format!("bad MultiPolygon coordinates: {}", e)))?;
                let rings: Vec<Ring> = polygons.into_iter().filter_map(outer_ring).collect();
                if rings.is_empty() {
                    return Err(malformed("empty MultiPolygon".to_string()));
                }
                Ok(BoundaryGeometry::MultiPolygon(rings))
            }
            other => Err(malformed(format!("unsupported geometry type {}", other))),
        }
    }
}

fn outer_ring(rings: Vec<Vec<[f64; 2]>>) -> Option<Ring> {
    let outer = rings.into_iter().next()?;
    if outer.len() < 3 {
        return None;
    }
    Some(outer.into_iter().map(GeoPoint::from_lng_lat).collect())
}

/// Even-odd ray cast of `point` against one ring
///
/// The ray runs towards +lng. An edge counts when it straddles the point's
/// latitude (lower endpoint inclusive, upper exclusive) and its crossing lies
/// strictly east of the point.
pub fn point_in_ring(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// One administrative village and its boundary
#[derive(Debug, Clone, PartialEq)]
pub struct VillageBoundary {
    pub key: VillageKey,
    pub village_code: String,
    pub geometry: BoundaryGeometry,
}

/// First boundary enclosing `point`, scanning in order
pub fn locate(point: GeoPoint, boundaries: &[VillageBoundary]) -> Option<&VillageKey> {
    boundaries
        .iter()
        .find(|boundary| boundary.geometry.contains(point))
        .map(|boundary| &boundary.key)
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    geometry: Option<Value>,
}

/// Immutable set of village boundaries, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    boundaries: Vec<VillageBoundary>,
}

impl BoundarySet {
    pub fn new(boundaries: Vec<VillageBoundary>) -> Self {
        Self { boundaries }
    }

    /// Read a GeoJSON file from disk
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let text = std::fs::read_to_string(path)?;
        let set = Self::from_geojson_str(&text)?;
        tracing::info!(
            path = %path.display(),
            villages = set.len(),
            "Loaded village boundaries"
        );
        Ok(set)
    }

    /// Parse a FeatureCollection
    ///
    /// Features with unsupported or broken geometry, or without names, are
    /// logged and skipped. Only an unparseable document is an error.
    pub fn from_geojson_str(text: &str) -> Result<Self, IngestError> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        let mut boundaries = Vec::with_capacity(collection.features.len());

        for (index, feature) in collection.features.iter().enumerate() {
            match parse_feature(index, feature) {
                Ok(boundary) => boundaries.push(boundary),
                Err(e) => tracing::warn!(feature = index, error = %e, "Skipping boundary feature"),
            }
        }

        Ok(Self { boundaries })
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn boundaries(&self) -> &[VillageBoundary] {
        &self.boundaries
    }

    pub fn locate(&self, point: GeoPoint) -> Option<&VillageKey> {
        locate(point, &self.boundaries)
    }

    pub fn keys(&self) -> BTreeSet<VillageKey> {
        self.boundaries.iter().map(|b| b.key.clone()).collect()
    }

    pub fn counties(&self) -> BTreeSet<String> {
        self.boundaries
            .iter()
            .map(|b| b.key.county().to_string())
            .collect()
    }

    pub fn towns_by_county(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut towns: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for boundary in &self.boundaries {
            towns
                .entry(boundary.key.county().to_string())
                .or_default()
                .insert(boundary.key.town().to_string());
        }
        towns
    }
}

fn parse_feature(index: usize, feature: &Feature) -> Result<VillageBoundary, IngestError> {
    let property = |name: &str| -> Result<String, IngestError> {
        feature
            .properties
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| IngestError::MalformedBoundaryGeometry {
                feature: index,
                reason: format!("missing property {}", name),
            })
    };

    let key = VillageKey::new(
        property("COUNTYNAME")?,
        property("TOWNNAME")?,
        property("VILLNAME")?,
    );
    let village_code = property("VILLCODE").unwrap_or_default();

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| IngestError::MalformedBoundaryGeometry {
            feature: index,
            reason: "feature has no geometry".to_string(),
        })?;

    Ok(VillageBoundary {
        key,
        village_code,
        geometry: BoundaryGeometry::from_geojson(geometry, index)?,
    })
}
