//! Override tier: live edits stored as one partial patch per village
//!
//! Patches are re-sanitized on read, so rows edited by hand still reach the
//! reconciler in their declared shapes.

use civmap_common::VillageKey;
use sqlx::{Executor, Pool, Sqlite};

use crate::error::IngestError;
use crate::models::community_record::RecordPatch;
use crate::services::record_sanitizer::sanitize_patch;

fn decode_patch(raw: &str) -> Result<RecordPatch, IngestError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    sanitize_patch(&value)
}

/// Stored override for a village, if any
pub async fn get_override(
    db: &Pool<Sqlite>,
    key: &VillageKey,
) -> Result<Option<RecordPatch>, IngestError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT patch FROM village_overrides WHERE village_key = ?")
            .bind(key.to_string())
            .fetch_optional(db)
            .await?;

    row.map(|(raw,)| decode_patch(&raw)).transpose()
}

/// Replace the stored override for a village
async fn put_override<'e, E>(
    executor: E,
    key: &VillageKey,
    patch: &RecordPatch,
) -> Result<(), IngestError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO village_overrides (village_key, patch, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(village_key) DO UPDATE SET patch = excluded.patch, updated_at = excluded.updated_at",
    )
    .bind(key.to_string())
    .bind(serde_json::to_string(patch)?)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

/// Fold a live edit into the stored override
///
/// Read, overlay and write happen in one transaction. Returns the new
/// stored override.
pub async fn apply_edit(
    db: &Pool<Sqlite>,
    key: &VillageKey,
    edit: RecordPatch,
) -> Result<RecordPatch, IngestError> {
    let mut tx = db.begin().await?;

    let row: Option<(String,)> =
        sqlx::query_as("SELECT patch FROM village_overrides WHERE village_key = ?")
            .bind(key.to_string())
            .fetch_optional(&mut *tx)
            .await?;

    let mut stored = match row {
        Some((raw,)) => decode_patch(&raw)?,
        None => RecordPatch::default(),
    };
    stored.overlay(edit);

    put_override(&mut *tx, key, &stored).await?;
    tx.commit().await?;

    tracing::debug!(village = %key, "Override updated");
    Ok(stored)
}

/// Remove a village's override; returns whether one existed
pub async fn delete_override(db: &Pool<Sqlite>, key: &VillageKey) -> Result<bool, IngestError> {
    let result = sqlx::query("DELETE FROM village_overrides WHERE village_key = ?")
        .bind(key.to_string())
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Every village with a stored override; malformed keys are skipped
pub async fn list_override_keys(db: &Pool<Sqlite>) -> Result<Vec<VillageKey>, IngestError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT village_key FROM village_overrides ORDER BY village_key")
            .fetch_all(db)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(raw,)| match raw.parse::<VillageKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(key = %raw, error = %e, "Ignoring malformed override key");
                None
            }
        })
        .collect())
}
