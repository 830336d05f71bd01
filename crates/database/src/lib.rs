//! Persistence gateway for dronelens.
//!
//! This crate owns the write-mostly data model:
//! - Raw uploaded images (`raw_images`)
//! - The append-only audit log (`app_logs`)
//! - Training run bookkeeping (`train_runs`)
//! - The dataset file catalog (`visdrone_files`)
//!
//! Two implementations of the [`Store`] trait are provided: PostgreSQL for
//! production and SQLite for local runs and tests.

pub mod error;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::{DbError, DbResult};
pub use models::{
    FileType, LogLevel, NewCatalogEntry, NewLogEntry, NewRawImage, NewTrainRun, TrainRun,
    TrainRunFinish,
};
pub use postgres::PgStore;
pub use sqlite::SqliteStore;
pub use store::{append_log_best_effort, Store};
