//! The persistence gateway trait.

use async_trait::async_trait;

use crate::error::DbResult;
use crate::models::{NewCatalogEntry, NewLogEntry, NewRawImage, NewTrainRun, TrainRun, TrainRunFinish};

/// Write-mostly gateway over the relational store.
///
/// Each operation executes exactly one statement against a pooled
/// connection. No operation composes transactions; the store's own
/// primary-key and uniqueness constraints are the only consistency
/// mechanism.
#[async_trait]
pub trait Store: Send + Sync {
    /// Applies the embedded schema. Safe to run repeatedly.
    async fn migrate(&self) -> DbResult<()>;

    /// Checks database connectivity.
    async fn health_check(&self) -> DbResult<()>;

    /// Inserts one raw image row and returns its generated id.
    async fn insert_raw_image(&self, image: NewRawImage) -> DbResult<i64>;

    /// Appends one audit log row. The timestamp is store-assigned.
    async fn append_log(&self, entry: NewLogEntry) -> DbResult<()>;

    /// Creates a training run row with finish fields NULL, returning its id.
    async fn insert_train_run(&self, run: NewTrainRun) -> DbResult<i64>;

    /// Fetches a training run by id.
    async fn get_train_run(&self, id: i64) -> DbResult<Option<TrainRun>>;

    /// Marks a run finished, merging each supplied field over the existing
    /// value. A `None` field never overwrites a stored column with NULL.
    async fn finish_train_run(&self, id: i64, finish: TrainRunFinish) -> DbResult<()>;

    /// Inserts a catalog row, silently skipping a `(split, file_type,
    /// rel_path)` collision. Returns whether a row was actually inserted.
    async fn upsert_catalog_entry(&self, entry: NewCatalogEntry) -> DbResult<bool>;

    /// Counts catalog rows.
    async fn count_catalog_entries(&self) -> DbResult<i64>;
}

/// Appends a log row, downgrading any failure to a console notice.
///
/// Logging failures must never abort the caller's primary operation, so
/// the error stops here.
pub async fn append_log_best_effort(store: &dyn Store, entry: NewLogEntry) {
    let level = entry.level;
    let message = entry.message.clone();
    if let Err(e) = store.append_log(entry).await {
        tracing::warn!(%level, message, error = %e, "log write failed, continuing");
    }
}
