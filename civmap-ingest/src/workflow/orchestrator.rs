//! Batch enrichment orchestrator
//!
//! Drives external source rows into village records:
//!
//! 1. Structural parse of the address against known county/town names
//! 2. If that fails, or the key is not canonical, geocode and match the
//!    point against the boundary set (addresses longer than 5 characters only)
//! 3. On a canonical key, add a care action to that village's base record,
//!    deduplicated by title
//! 4. Otherwise count the row as unresolved and move on
//!
//! Per-row failures never abort a run. Cancellation is checked between rows.

use civmap_common::config::{SourceConfig, SourceKind};
use civmap_common::VillageKey;
use serde_json::Value;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::sources::{load_source, SourceRow};
use super::statistics::EnrichmentStats;
use crate::db::BaseRecordStore;
use crate::error::IngestError;
use crate::models::community_record::{CommunityRecord, KeyedItem};
use crate::services::structural_parser::{parse_address, Gazetteer};
use crate::services::village_resolver::VillageResolver;

/// Minimum address length (characters) worth geocoding
const MIN_GEOCODE_ADDRESS_CHARS: usize = 5;

/// How a row reached its village
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Structural,
    Geocoded,
}

/// Batch enrichment pipeline
pub struct EnrichmentPipeline {
    store: BaseRecordStore,
    resolver: VillageResolver,
    canonical: BTreeSet<VillageKey>,
    gazetteer: Gazetteer,
    cancel: CancellationToken,
}

impl EnrichmentPipeline {
    /// The canonical key set is the union of boundary keys and base record keys
    pub fn new(store: BaseRecordStore, resolver: VillageResolver, cancel: CancellationToken) -> Self {
        let mut canonical = resolver.boundaries().keys();
        canonical.extend(store.keys());
        let gazetteer = Gazetteer::from_keys(canonical.iter());

        tracing::info!(villages = canonical.len(), "Canonical village set built");

        Self {
            store,
            resolver,
            canonical,
            gazetteer,
            cancel,
        }
    }

    pub fn canonical_keys(&self) -> &BTreeSet<VillageKey> {
        &self.canonical
    }

    pub fn store(&self) -> &BaseRecordStore {
        &self.store
    }

    /// Process every source in order
    ///
    /// Unreadable sources are logged and counted; the run continues.
    pub async fn run(&self, sources: &[SourceConfig]) -> EnrichmentStats {
        let mut total = EnrichmentStats::default();

        for source in sources {
            if self.cancel.is_cancelled() {
                total.cancelled = true;
                break;
            }

            match self.process_source(source).await {
                Ok(stats) => total.absorb(&stats),
                Err(e) => {
                    tracing::warn!(path = %source.path.display(), error = %e, "Skipping source");
                    total.sources_failed += 1;
                }
            }
        }

        tracing::info!(
            processed = total.processed,
            matched = total.matched(),
            geocoded = total.geocoded,
            updated = total.updated,
            unresolved = total.unresolved,
            duplicates = total.duplicates,
            cancelled = total.cancelled,
            "Enrichment complete"
        );
        total
    }

    pub async fn process_source(&self, source: &SourceConfig) -> Result<EnrichmentStats, IngestError> {
        tracing::info!(path = %source.path.display(), kind = source.kind.as_str(), "Processing source");
        let rows = load_source(&source.path)?;
        let default_county = Some(source.county.as_str()).filter(|c| !c.is_empty());
        Ok(self.process_rows(&rows, source.kind, default_county).await)
    }

    /// Process parsed rows of one source
    pub async fn process_rows(
        &self,
        rows: &[SourceRow],
        kind: SourceKind,
        default_county: Option<&str>,
    ) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();

        for row in rows {
            if self.cancel.is_cancelled() {
                tracing::info!(line = row.line, "Enrichment cancelled");
                stats.cancelled = true;
                break;
            }

            stats.processed += 1;

            if row.name.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let Some((key, key_source)) = self.resolve_row(row, default_county).await else {
                stats.unresolved += 1;
                continue;
            };

            match key_source {
                KeySource::Structural => stats.structurally_matched += 1,
                KeySource::Geocoded => stats.geocoded += 1,
            }

            let item = build_care_action(row, kind);
            match self.store.upsert(&key, |record| add_care_action(record, item)) {
                Ok(true) => {
                    tracing::debug!(village = %key, name = %row.name, "Added care action");
                    stats.updated += 1;
                }
                Ok(false) => {
                    tracing::debug!(village = %key, name = %row.name, "Care action already present");
                    stats.duplicates += 1;
                }
                Err(e) => {
                    tracing::error!(village = %key, line = row.line, error = %e, "Failed to write village record");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Village key for one row, or `None` (already logged)
    pub async fn resolve_row(
        &self,
        row: &SourceRow,
        default_county: Option<&str>,
    ) -> Option<(VillageKey, KeySource)> {
        let parsed = parse_address(&row.address, default_county, &self.gazetteer);

        if let Some(parsed) = &parsed {
            if self.canonical.contains(&parsed.key) {
                if parsed.guessed {
                    tracing::warn!(
                        address = %row.address,
                        village = %parsed.key,
                        "Accepted guessed village from town name"
                    );
                }
                return Some((parsed.key.clone(), KeySource::Structural));
            }
        }

        if row.address.chars().count() <= MIN_GEOCODE_ADDRESS_CHARS {
            tracing::warn!(
                line = row.line,
                name = %row.name,
                address = %row.address,
                parsed = ?parsed.as_ref().map(|p| p.key.to_string()),
                "Unresolved row: address too short to geocode"
            );
            return None;
        }

        match self.resolver.resolve_address_to_village(&row.address).await {
            Ok(resolved) if self.canonical.contains(&resolved.village_key) => {
                tracing::info!(
                    address = %row.address,
                    village = %resolved.village_key,
                    name = %row.name,
                    "Geocoded row to village"
                );
                Some((resolved.village_key, KeySource::Geocoded))
            }
            Ok(resolved) => {
                tracing::warn!(
                    line = row.line,
                    address = %row.address,
                    village = %resolved.village_key,
                    "Unresolved row: geocoded village not in canonical set"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    line = row.line,
                    name = %row.name,
                    address = %row.address,
                    parsed = ?parsed.as_ref().map(|p| p.key.to_string()),
                    error = %e,
                    "Unresolved row"
                );
                None
            }
        }
    }
}

/// Care action item for a source row
pub fn build_care_action(row: &SourceRow, kind: SourceKind) -> KeyedItem {
    let (label, tags, beneficiaries): (&str, [&str; 3], &str) = match kind {
        SourceKind::FoodBank => ("實物銀行", ["食物銀行", "物資發放", "社會救助"], "弱勢家庭"),
        SourceKind::CareCenter => ("關懷據點", ["關懷據點", "老人共餐", "社區照顧"], "社區長者"),
    };

    let mut item = KeyedItem::new(format!("import_{}_{}", kind.as_str(), Uuid::new_v4()))
        .with("title", row.name.as_str())
        .with("type", "care_action")
        .with("subtype", kind.as_str())
        .with(
            "description",
            format!("[{}] 位於{}的在地服務資源。", label, row.address),
        )
        .with("address", row.address.as_str())
        .with(
            "tags",
            Value::Array(tags.iter().map(|t| Value::from(*t)).collect()),
        )
        .with("status", "ongoing")
        .with("beneficiaries", beneficiaries);

    if !row.phone.is_empty() {
        item = item.with("phone", row.phone.as_str());
    }
    if !row.time.is_empty() {
        item = item.with("time", row.time.as_str());
    }
    item
}

/// Append unless an action with the same title exists; returns whether added
pub fn add_care_action(record: &mut CommunityRecord, item: KeyedItem) -> bool {
    let title = item.title();
    if record
        .care_actions
        .iter()
        .any(|existing| existing.title() == title)
    {
        return false;
    }
    record.care_actions.push(item);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, address: &str) -> SourceRow {
        SourceRow {
            line: 2,
            name: name.to_string(),
            address: address.to_string(),
            phone: "03-5551234".to_string(),
            time: String::new(),
        }
    }

    #[test]
    fn test_care_center_item_shape() {
        let item = build_care_action(&row("北崙關懷站", "竹北市北崙里"), SourceKind::CareCenter);

        assert!(item.id.starts_with("import_care_center_"));
        assert_eq!(item.title(), Some("北崙關懷站"));
        assert_eq!(item.get_str("type"), Some("care_action"));
        assert_eq!(item.get_str("subtype"), Some("care_center"));
        assert_eq!(
            item.get_str("description"),
            Some("[關懷據點] 位於竹北市北崙里的在地服務資源。")
        );
        assert_eq!(item.get_str("beneficiaries"), Some("社區長者"));
        assert_eq!(item.fields["tags"][1], "老人共餐");
        assert_eq!(item.get_str("phone"), Some("03-5551234"));
        assert!(!item.fields.contains_key("time"));
        assert_eq!(item.get_str("status"), Some("ongoing"));
    }

    #[test]
    fn test_food_bank_item_shape() {
        let item = build_care_action(&row("食物銀行", "竹東鎮"), SourceKind::FoodBank);
        assert!(item.id.starts_with("import_food_bank_"));
        assert_eq!(item.get_str("beneficiaries"), Some("弱勢家庭"));
        assert_eq!(item.fields["tags"][0], "食物銀行");
        assert!(item.get_str("description").unwrap().starts_with("[實物銀行]"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = build_care_action(&row("a", "b"), SourceKind::FoodBank);
        let b = build_care_action(&row("a", "b"), SourceKind::FoodBank);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_add_care_action_dedupes_by_title() {
        let mut record = CommunityRecord::default();
        assert!(add_care_action(&mut record, KeyedItem::new("1").with("title", "共餐")));
        assert!(!add_care_action(&mut record, KeyedItem::new("2").with("title", "共餐")));
        assert!(add_care_action(&mut record, KeyedItem::new("3").with("title", "送餐")));
        assert_eq!(record.care_actions.len(), 2);
    }
}
