//! SQLite gateway implementation.
//!
//! Used for local runs without a PostgreSQL instance and for tests; the
//! production deployment uses [`crate::PgStore`].

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::error::{DbError, DbResult};
use crate::models::{
    NewCatalogEntry, NewLogEntry, NewRawImage, NewTrainRun, TrainRun, TrainRunFinish,
};
use crate::store::Store;

/// SQLite schema (embedded).
const SQLITE_SCHEMA: &str = include_str!("sqlite_schema.sql");

/// SQLite-backed persistence gateway.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Opens (creating if missing) a SQLite database file and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        Self::with_options(opts).await
    }

    /// Opens an in-memory database, for tests and throwaway runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn in_memory() -> DbResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::with_options(opts).await
    }

    async fn with_options(opts: SqliteConnectOptions) -> DbResult<Self> {
        // SQLite permits limited write concurrency; a single connection
        // avoids "database is locked" failures and keeps :memory: stores
        // on one database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn migrate(&self) -> DbResult<()> {
        for statement in SQLITE_SCHEMA.split(';') {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            if has_sql {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_raw_image(&self, image: NewRawImage) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO raw_images (filename, content_type, width, height, bytes)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&image.filename)
        .bind(&image.content_type)
        .bind(image.width)
        .bind(image.height)
        .bind(&image.bytes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn append_log(&self, entry: NewLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO app_logs (level, source, run_id, message, detail)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.level.as_str())
        .bind(&entry.source)
        .bind(entry.run_id)
        .bind(&entry.message)
        .bind(&entry.detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_train_run(&self, run: NewTrainRun) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO train_runs
            (model_name, data_yaml, epochs, imgsz, batch, lr0, train_imgs, val_imgs, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&run.model_name)
        .bind(&run.data_yaml)
        .bind(run.epochs)
        .bind(run.imgsz)
        .bind(run.batch)
        .bind(run.lr0)
        .bind(run.train_imgs)
        .bind(run.val_imgs)
        .bind(&run.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn get_train_run(&self, id: i64) -> DbResult<Option<TrainRun>> {
        let run = sqlx::query_as::<_, TrainRun>(
            r#"
            SELECT id, started_at, finished_at, model_name, data_yaml, epochs, imgsz,
                   batch, lr0, train_imgs, val_imgs, best_map50, best_map5095,
                   weights_path, notes
            FROM train_runs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    async fn finish_train_run(&self, id: i64, finish: TrainRunFinish) -> DbResult<()> {
        // SQLite has no now() with timezone; the finish timestamp is bound
        // explicitly instead of schema-defaulted.
        let result = sqlx::query(
            r#"
            UPDATE train_runs
            SET
                finished_at = ?,
                weights_path = COALESCE(?, weights_path),
                best_map50 = COALESCE(?, best_map50),
                best_map5095 = COALESCE(?, best_map5095)
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(&finish.weights_path)
        .bind(finish.best_map50)
        .bind(finish.best_map5095)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("train run {id}")));
        }
        Ok(())
    }

    async fn upsert_catalog_entry(&self, entry: NewCatalogEntry) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO visdrone_files (split, file_type, filename, rel_path, abs_path)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (split, file_type, rel_path) DO NOTHING
            "#,
        )
        .bind(&entry.split)
        .bind(&entry.file_type)
        .bind(&entry.filename)
        .bind(&entry.rel_path)
        .bind(&entry.abs_path)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_catalog_entries(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visdrone_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
