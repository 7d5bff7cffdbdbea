use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::{get_opt_time, to_db_time, DbConnection};

/// Last-run bookkeeping for one background worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRun {
    pub worker: String,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Repository behind the health endpoint
#[derive(Clone)]
pub struct WorkerRunRepository {
    db: DbConnection,
}

impl WorkerRunRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn record_start(&self, worker: &str, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO worker_runs (worker, last_started_at)
            VALUES (?, ?)
            ON CONFLICT(worker) DO UPDATE SET last_started_at = excluded.last_started_at
            "#,
        )
        .bind(worker)
        .bind(to_db_time(&now))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn record_success(&self, worker: &str, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO worker_runs (worker, last_success_at, consecutive_failures)
            VALUES (?, ?, 0)
            ON CONFLICT(worker) DO UPDATE
            SET last_success_at = excluded.last_success_at, consecutive_failures = 0
            "#,
        )
        .bind(worker)
        .bind(to_db_time(&now))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Record a failed tick and return the new consecutive-failure count
    pub async fn record_failure(
        &self,
        worker: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, sqlx::Error> {
        let failures: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO worker_runs (worker, last_error, last_error_at, consecutive_failures)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(worker) DO UPDATE
            SET last_error = excluded.last_error,
                last_error_at = excluded.last_error_at,
                consecutive_failures = worker_runs.consecutive_failures + 1
            RETURNING consecutive_failures
            "#,
        )
        .bind(worker)
        .bind(message)
        .bind(to_db_time(&now))
        .fetch_one(self.db.pool())
        .await?;
        Ok(u32::try_from(failures).unwrap_or(u32::MAX))
    }

    pub async fn get(&self, worker: &str) -> Result<Option<WorkerRun>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT worker, last_started_at, last_success_at, last_error, last_error_at,
                   consecutive_failures
            FROM worker_runs
            WHERE worker = ?
            "#,
        )
        .bind(worker)
        .fetch_optional(self.db.pool())
        .await?;
        row.as_ref().map(map_run).transpose()
    }

    pub async fn list(&self) -> Result<Vec<WorkerRun>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT worker, last_started_at, last_success_at, last_error, last_error_at,
                   consecutive_failures
            FROM worker_runs
            ORDER BY worker
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(map_run).collect()
    }
}

fn map_run(row: &SqliteRow) -> Result<WorkerRun, sqlx::Error> {
    let failures: i64 = row.try_get("consecutive_failures")?;
    Ok(WorkerRun {
        worker: row.try_get("worker")?,
        last_started_at: get_opt_time(row, "last_started_at")?,
        last_success_at: get_opt_time(row, "last_success_at")?,
        last_error: row.try_get("last_error")?,
        last_error_at: get_opt_time(row, "last_error_at")?,
        consecutive_failures: u32::try_from(failures).unwrap_or(u32::MAX),
    })
}
