//! Enrichment run counters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary returned by an enrichment run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStats {
    /// Data rows examined, including skipped ones
    pub processed: usize,
    /// Rows whose key came from the structural parse
    pub structurally_matched: usize,
    /// Rows whose key came from the geocoding fallback
    pub geocoded: usize,
    /// Rows that added an item to a village record
    pub updated: usize,
    /// Rows no key could be found for
    pub unresolved: usize,
    /// Rows without a name
    pub skipped: usize,
    /// Rows whose title already existed in the target village
    pub duplicates: usize,
    /// Rows whose record write failed
    pub failed: usize,
    /// Source files that could not be read
    pub sources_failed: usize,
    /// Run stopped early on cancellation
    pub cancelled: bool,
}

impl EnrichmentStats {
    /// Rows that reached a village key by either path
    pub fn matched(&self) -> usize {
        self.structurally_matched + self.geocoded
    }

    /// Add another run's counters
    pub fn absorb(&mut self, other: &EnrichmentStats) {
        self.processed += other.processed;
        self.structurally_matched += other.structurally_matched;
        self.geocoded += other.geocoded;
        self.updated += other.updated;
        self.unresolved += other.unresolved;
        self.skipped += other.skipped;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.sources_failed += other.sources_failed;
        self.cancelled |= other.cancelled;
    }
}

impl fmt::Display for EnrichmentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {}, Matched: {} (Geocoded: {}), New/Updated: {}, Unresolved: {}",
            self.processed,
            self.matched(),
            self.geocoded,
            self.updated,
            self.unresolved
        )
    }
}
