//! Persistent address → coordinate cache
//!
//! Entries are keyed by the original (trimmed) address string exactly as the
//! caller supplied it. Only successful lookups are ever stored. File-backed
//! caches are write-through: every insert rewrites the file atomically, so a
//! crash mid-batch loses nothing already resolved.

use civmap_common::{GeoPoint, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::utils::{read_json_file, write_json_atomic};

/// One cached resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub lat: f64,
    pub lng: f64,
    /// Unix milliseconds when the entry was written
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Address cache, optionally backed by a JSON file
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: BTreeMap<String, CacheEntry>,
    path: Option<PathBuf>,
}

impl AddressCache {
    /// Cache that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`
    ///
    /// A missing file starts an empty cache at that path. An unreadable or
    /// corrupt file is logged and replaced on the next insert.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_json_file::<BTreeMap<String, CacheEntry>>(&path) {
            Ok(Some(entries)) => {
                tracing::info!(
                    path = %path.display(),
                    entries = entries.len(),
                    "Loaded geocode cache"
                );
                entries
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load geocode cache, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            entries,
            path: Some(path),
        }
    }

    pub fn get(&self, address: &str) -> Option<GeoPoint> {
        self.entries.get(address).map(CacheEntry::point)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a successful resolution and persist immediately
    ///
    /// The in-memory entry is kept even when the write fails; the error is
    /// returned so the caller can log it.
    pub fn insert(&mut self, address: &str, point: GeoPoint) -> Result<()> {
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                lat: point.lat,
                lng: point.lng,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, &self.entries),
            None => Ok(()),
        }
    }
}
