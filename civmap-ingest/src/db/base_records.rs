//! Base tier: one JSON document per village on disk
//!
//! Layout is `{root}/{county}/{town}/{village}/wiki.json`. Documents are
//! sanitized on load and written atomically (temp file + rename).

use civmap_common::VillageKey;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::models::community_record::CommunityRecord;
use crate::services::record_sanitizer::sanitize_record;
use crate::utils::{read_json_file, write_json_atomic};

/// File name of each village document
pub const RECORD_FILE: &str = "wiki.json";

/// Directory-tree record store
#[derive(Debug, Clone)]
pub struct BaseRecordStore {
    root: PathBuf,
}

impl BaseRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &VillageKey) -> PathBuf {
        self.root
            .join(key.county())
            .join(key.town())
            .join(key.village())
            .join(RECORD_FILE)
    }

    /// Every village that has a document
    ///
    /// A missing root is an empty store. Unreadable entries are logged and
    /// skipped.
    pub fn keys(&self) -> BTreeSet<VillageKey> {
        let mut keys = BTreeSet::new();
        if !self.root.is_dir() {
            return keys;
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(4)
            .max_depth(4);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != RECORD_FILE {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<&str> = relative
                .iter()
                .take(3)
                .filter_map(|part| part.to_str())
                .collect();

            match parts.as_slice() {
                [county, town, village]
                    if [county, town, village].iter().all(|p| !p.contains('_')) =>
                {
                    keys.insert(VillageKey::new(*county, *town, *village));
                }
                _ => tracing::debug!(path = %entry.path().display(), "Skipping non-village document"),
            }
        }

        tracing::debug!(root = %self.root.display(), villages = keys.len(), "Scanned base records");
        keys
    }

    /// Load and sanitize a village document; `None` when absent
    pub fn load(&self, key: &VillageKey) -> Result<Option<CommunityRecord>, IngestError> {
        match read_json_file::<Value>(&self.path_for(key))? {
            Some(value) => Ok(Some(sanitize_record(&value)?)),
            None => Ok(None),
        }
    }

    /// Load, falling back to an empty record when absent
    pub fn load_or_default(&self, key: &VillageKey) -> Result<CommunityRecord, IngestError> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    pub fn save(&self, key: &VillageKey, record: &CommunityRecord) -> Result<(), IngestError> {
        write_json_atomic(&self.path_for(key), record)?;
        Ok(())
    }

    /// Read-modify-write one document
    ///
    /// `update` returns whether it changed anything; unchanged records are
    /// not rewritten.
    pub fn upsert<F>(&self, key: &VillageKey, update: F) -> Result<bool, IngestError>
    where
        F: FnOnce(&mut CommunityRecord) -> bool,
    {
        let mut record = self.load_or_default(key)?;
        if !update(&mut record) {
            return Ok(false);
        }
        self.save(key, &record)?;
        Ok(true)
    }
}
