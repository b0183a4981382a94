//! Convex hulls, centroids and township aggregates
//!
//! Townships have no authoritative polygon in the dataset; an approximate
//! outline is synthesized as the convex hull of every member village vertex
//! and labeled at the hull centroid.

use civmap_common::GeoPoint;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::polygon_matcher::{BoundarySet, Ring};

/// Convex hull by monotone chain
///
/// Points are sorted by `(lng, lat)`; collinear points are dropped. Fewer
/// than three points are returned unchanged.
pub fn convex_hull(points: &[GeoPoint]) -> Ring {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| {
        a.lng
            .partial_cmp(&b.lng)
            .unwrap_or(Ordering::Equal)
            .then(a.lat.partial_cmp(&b.lat).unwrap_or(Ordering::Equal))
    });

    let mut lower: Vec<GeoPoint> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<GeoPoint> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    // Each chain's last point starts the other
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// z-component of `(a - o) x (b - o)`, positive for a left turn
fn cross(o: GeoPoint, a: GeoPoint, b: GeoPoint) -> f64 {
    (a.lng - o.lng) * (b.lat - o.lat) - (a.lat - o.lat) * (b.lng - o.lng)
}

/// Arithmetic mean of the ring vertices
pub fn centroid(ring: &[GeoPoint]) -> Option<GeoPoint> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (lat, lng) = ring
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(GeoPoint::new(lat / n, lng / n))
}

/// Synthesized township outline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TownshipAggregate {
    /// `{county}_{town}`
    pub key: String,
    pub county: String,
    pub town: String,
    pub village_count: usize,
    pub hull: Ring,
    pub label: Option<GeoPoint>,
}

/// Group villages by township and build one hull per township
pub fn aggregate_townships(boundaries: &BoundarySet) -> Vec<TownshipAggregate> {
    let mut groups: BTreeMap<String, (String, String, usize, Vec<GeoPoint>)> = BTreeMap::new();

    for boundary in boundaries.boundaries() {
        let entry = groups.entry(boundary.key.township()).or_insert_with(|| {
            (
                boundary.key.county().to_string(),
                boundary.key.town().to_string(),
                0,
                Vec::new(),
            )
        });
        entry.2 += 1;
        for ring in boundary.geometry.outer_rings() {
            entry.3.extend_from_slice(ring);
        }
    }

    groups
        .into_iter()
        .map(|(key, (county, town, village_count, vertices))| {
            let hull = convex_hull(&vertices);
            let label = centroid(&hull);
            TownshipAggregate {
                key,
                county,
                town,
                village_count,
                hull,
                label,
            }
        })
        .collect()
}
