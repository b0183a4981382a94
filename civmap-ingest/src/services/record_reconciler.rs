//! Base/override record reconciliation
//!
//! Merge strategy per field kind:
//! - Scalars: the override wins when present and non-empty
//! - Keyed collections: merge by id. Matching ids take the override's item,
//!   override-only ids are appended, base-only ids are kept
//! - Unkeyed lists: the override replaces the base wholesale when present
//! - `wiki` and unrecognized fields: shallow overlay, one level deep
//!
//! Both sides must already be sanitized.

use crate::models::community_record::{
    CommunityRecord, Fields, KeyedCollection, KeyedItem, MergedRecord, RecordPatch,
};

/// Merge one override onto a base record
pub fn merge(base: &CommunityRecord, patch: &RecordPatch) -> MergedRecord {
    let mut merged = base.clone();

    overlay_scalar(&mut merged.description, &patch.description);
    overlay_scalar(&mut merged.chief, &patch.chief);
    overlay_scalar(&mut merged.population, &patch.population);

    for kind in KeyedCollection::ALL {
        if let Some(items) = patch.collection(kind) {
            let target = merged.collection_mut(kind);
            *target = merge_by_id(target, items);
        }
    }

    if let Some(people) = &patch.people {
        merged.people = people.clone();
    }
    if let Some(tags) = &patch.tags {
        merged.tags = tags.clone();
    }

    if let Some(wiki) = &patch.wiki {
        overlay_fields(&mut merged.wiki, wiki);
    }
    overlay_fields(&mut merged.extra, &patch.extra);

    merged
}

/// Apply tiers in ascending priority; later tiers win
pub fn merge_tiers(base: &CommunityRecord, tiers: &[RecordPatch]) -> MergedRecord {
    tiers
        .iter()
        .fold(base.clone(), |merged, tier| merge(&merged, tier))
}

/// Merge two keyed lists, keeping base order and appending new ids
pub fn merge_by_id(base: &[KeyedItem], overrides: &[KeyedItem]) -> Vec<KeyedItem> {
    let mut merged: Vec<KeyedItem> = base
        .iter()
        .map(|item| {
            overrides
                .iter()
                .find(|o| o.id == item.id)
                .unwrap_or(item)
                .clone()
        })
        .collect();

    for item in overrides {
        if !base.iter().any(|b| b.id == item.id) {
            merged.push(item.clone());
        }
    }

    merged
}

fn overlay_scalar(target: &mut String, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn overlay_fields(target: &mut Fields, overlay: &Fields) {
    for (key, value) in overlay {
        target.insert(key.clone(), value.clone());
    }
}

impl RecordPatch {
    /// Fold a newer edit into this stored override
    ///
    /// Afterwards `merge(base, &older)` equals
    /// `merge(&merge(base, &older_before), &newer)` for any base.
    pub fn overlay(&mut self, newer: RecordPatch) {
        let RecordPatch {
            description,
            chief,
            population,
            people,
            tags,
            wiki,
            extra,
            ..
        } = &newer;

        overlay_optional_scalar(&mut self.description, description);
        overlay_optional_scalar(&mut self.chief, chief);
        overlay_optional_scalar(&mut self.population, population);

        for kind in KeyedCollection::ALL {
            if let Some(items) = newer.collection(kind) {
                let slot = self.collection_mut(kind);
                *slot = Some(match slot.as_deref() {
                    Some(existing) => merge_by_id(existing, items),
                    None => items.clone(),
                });
            }
        }

        if people.is_some() {
            self.people = people.clone();
        }
        if tags.is_some() {
            self.tags = tags.clone();
        }

        if let Some(wiki) = wiki {
            overlay_fields(self.wiki.get_or_insert_with(Fields::new), wiki);
        }
        overlay_fields(&mut self.extra, extra);
    }
}

fn overlay_optional_scalar(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        *target = Some(value.to_string());
    }
}
