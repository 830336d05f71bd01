//! PostgreSQL gateway implementation.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};
use crate::models::{
    NewCatalogEntry, NewLogEntry, NewRawImage, NewTrainRun, TrainRun, TrainRunFinish,
};
use crate::store::Store;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// Splits an embedded schema into individual statements; PostgreSQL does
/// not allow multiple statements in a single prepared statement.
fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-backed persistence gateway.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to the database and returns the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to the database fails.
    pub async fn connect(database_url: &str) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn migrate(&self) -> DbResult<()> {
        for statement in schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
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
            VALUES ($1, $2, $3, $4, $5)
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
            VALUES ($1, $2, $3, $4, $5)
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
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
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    async fn finish_train_run(&self, id: i64, finish: TrainRunFinish) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE train_runs
            SET
                finished_at = now(),
                weights_path = COALESCE($2, weights_path),
                best_map50 = COALESCE($3, best_map50),
                best_map5095 = COALESCE($4, best_map5095)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&finish.weights_path)
        .bind(finish.best_map50)
        .bind(finish.best_map5095)
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
            VALUES ($1, $2, $3, $4, $5)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_skip_comment_only_chunks() {
        let statements = schema_statements(POSTGRES_SCHEMA);
        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| s.contains("CREATE TABLE")));
    }
}
