use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::AppConfig;

/// DbConnection manages the shared SQLite pool
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if needed) the database at `url` and set up the schema.
    ///
    /// `busy_timeout` bounds how long a writer waits for SQLite's single write
    /// lock; concurrent generators serialize on it rather than on an app lock.
    pub async fn new(url: &str, max_connections: u32, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {}", url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let filename = options.clone().get_filename();
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating data directory {}", parent.display()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(busy_timeout + Duration::from_secs(5))
            .connect_with(options)
            .await
            .context("connecting to database")?;

        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the database described by the process configuration
    pub async fn init(config: &AppConfig) -> Result<Self> {
        info!(url = %config.database_url, "opening database");
        Self::new(
            &config.database_url,
            config.db_max_connections,
            config.db_busy_timeout,
        )
        .await
    }

    /// Initialize a throwaway file database for tests
    #[cfg(test)]
    pub async fn init_test() -> Result<TestDb> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let db = Self::new(&url, 4, Duration::from_secs(5)).await?;
        Ok(TestDb { db, _dir: dir })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("schema statement failed: {}", statement.trim()))?;
        }
        Ok(())
    }
}

/// A database living in a temporary directory that is removed on drop.
#[cfg(test)]
pub struct TestDb {
    pub db: DbConnection,
    _dir: tempfile::TempDir,
}

#[cfg(test)]
impl std::ops::Deref for TestDb {
    type Target = DbConnection;

    fn deref(&self) -> &DbConnection {
        &self.db
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS households (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS care_recipients (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        name_enc TEXT NOT NULL,
        timezone TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (household_id) REFERENCES households (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_care_recipients_household
    ON care_recipients(household_id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_templates (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        title_enc TEXT NOT NULL,
        description_enc TEXT,
        category TEXT NOT NULL DEFAULT 'general',
        assigned_to TEXT,
        frequency TEXT NOT NULL,
        times_of_day TEXT NOT NULL,
        days_of_week TEXT NOT NULL DEFAULT '[]',
        day_of_month INTEGER,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (recipient_id) REFERENCES care_recipients (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        template_id TEXT,
        title_enc TEXT NOT NULL,
        description_enc TEXT,
        category TEXT NOT NULL DEFAULT 'general',
        assigned_to TEXT,
        scheduled_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        notes_enc TEXT,
        completed_at TEXT,
        completed_by TEXT,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (recipient_id) REFERENCES care_recipients (id) ON DELETE CASCADE,
        FOREIGN KEY (template_id) REFERENCES task_templates (id)
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_tasks_template_slot
    ON tasks(template_id, scheduled_at)
    WHERE template_id IS NOT NULL AND deleted_at IS NULL;
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tasks_recipient_scheduled
    ON tasks(recipient_id, scheduled_at);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tasks_status_scheduled
    ON tasks(status, scheduled_at);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS medications (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        name_enc TEXT NOT NULL,
        dosage_enc TEXT NOT NULL,
        instructions_enc TEXT,
        is_prn BOOLEAN NOT NULL DEFAULT FALSE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (recipient_id) REFERENCES care_recipients (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS medication_schedules (
        id TEXT PRIMARY KEY,
        medication_id TEXT NOT NULL,
        household_id TEXT NOT NULL,
        frequency TEXT NOT NULL,
        times_of_day TEXT NOT NULL,
        days_of_week TEXT NOT NULL DEFAULT '[]',
        day_of_month INTEGER,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (medication_id) REFERENCES medications (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS medication_logs (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        medication_id TEXT NOT NULL,
        schedule_id TEXT,
        dosage_enc TEXT NOT NULL,
        scheduled_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        notes_enc TEXT,
        administered_at TEXT,
        administered_by TEXT,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (medication_id) REFERENCES medications (id) ON DELETE CASCADE,
        FOREIGN KEY (schedule_id) REFERENCES medication_schedules (id)
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_medication_logs_schedule_slot
    ON medication_logs(medication_id, schedule_id, scheduled_at)
    WHERE schedule_id IS NOT NULL AND deleted_at IS NULL;
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_medication_logs_recipient_scheduled
    ON medication_logs(recipient_id, scheduled_at);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shift_templates (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        caregiver_id TEXT NOT NULL,
        title_enc TEXT,
        frequency TEXT NOT NULL,
        times_of_day TEXT NOT NULL,
        days_of_week TEXT NOT NULL DEFAULT '[]',
        day_of_month INTEGER,
        duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (recipient_id) REFERENCES care_recipients (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shifts (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        template_id TEXT,
        caregiver_id TEXT NOT NULL,
        title_enc TEXT,
        starts_at TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'scheduled',
        clock_in_at TEXT,
        clock_out_at TEXT,
        notes_enc TEXT,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (recipient_id) REFERENCES care_recipients (id) ON DELETE CASCADE,
        FOREIGN KEY (template_id) REFERENCES shift_templates (id)
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_shifts_template_slot
    ON shifts(template_id, starts_at)
    WHERE template_id IS NOT NULL AND deleted_at IS NULL;
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_shifts_status_starts
    ON shifts(status, starts_at);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shift_handoffs (
        id TEXT PRIMARY KEY,
        shift_id TEXT NOT NULL,
        household_id TEXT NOT NULL,
        author_id TEXT NOT NULL,
        notes_enc TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (shift_id) REFERENCES shifts (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        household_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        ref_id TEXT,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        dismissed_at TEXT,
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_notifications_kind_ref
    ON notifications(kind, ref_id)
    WHERE ref_id IS NOT NULL;
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS login_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email_hash TEXT NOT NULL,
        success BOOLEAN NOT NULL DEFAULT FALSE,
        attempted_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS household_settings (
        household_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (household_id, key),
        FOREIGN KEY (household_id) REFERENCES households (id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS worker_runs (
        worker TEXT PRIMARY KEY,
        last_started_at TEXT,
        last_success_at TEXT,
        last_error TEXT,
        last_error_at TEXT,
        consecutive_failures INTEGER NOT NULL DEFAULT 0
    );
    "#,
];
