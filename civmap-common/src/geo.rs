//! Geographic value types shared across civmap crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Decimal-degree coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON position (`[lng, lat]`)
    pub fn from_lng_lat(position: [f64; 2]) -> Self {
        Self {
            lat: position[1],
            lng: position[0],
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Canonical `{county}_{town}_{village}` identifier
///
/// The join key between the boundary dataset, the base record tree and the
/// override table. Component names never contain `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VillageKey {
    county: String,
    town: String,
    village: String,
}

impl VillageKey {
    pub fn new(
        county: impl Into<String>,
        town: impl Into<String>,
        village: impl Into<String>,
    ) -> Self {
        Self {
            county: county.into(),
            town: town.into(),
            village: village.into(),
        }
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    pub fn town(&self) -> &str {
        &self.town
    }

    pub fn village(&self) -> &str {
        &self.village
    }

    /// `{county}_{town}`, the grouping key for township aggregates
    pub fn township(&self) -> String {
        format!("{}_{}", self.county, self.town)
    }
}

impl fmt::Display for VillageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.county, self.town, self.village)
    }
}

impl FromStr for VillageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        match parts.as_slice() {
            [county, town, village]
                if !county.is_empty() && !town.is_empty() && !village.is_empty() =>
            {
                Ok(Self::new(*county, *town, *village))
            }
            _ => Err(Error::InvalidInput(format!(
                "village key must be county_town_village, got '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for VillageKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VillageKey> for String {
    fn from(key: VillageKey) -> Self {
        key.to_string()
    }
}
