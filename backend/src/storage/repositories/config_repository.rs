use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use crate::storage::{to_db_time, DbConnection};

/// Key/value settings: process-wide (`app_config`) and per household
/// (`household_settings`)
#[derive(Clone)]
pub struct ConfigRepository {
    db: DbConnection,
}

impl ConfigRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM app_config WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|r| r.try_get("value")).transpose()
    }

    pub async fn set_value(
        &self,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut conn = self.db.pool().acquire().await?;
        Self::upsert_value(&mut conn, key, value, now).await
    }

    /// Upsert a process-wide value on an existing connection
    pub async fn upsert_value(
        conn: &mut SqliteConnection,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO app_config (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(to_db_time(&now))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// All process-wide overrides, ordered by key
    pub async fn list_values(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        let rows = sqlx::query("SELECT key, value FROM app_config ORDER BY key")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter()
            .map(|r| -> Result<(String, String), sqlx::Error> {
                Ok((r.try_get("key")?, r.try_get("value")?))
            })
            .collect()
    }

    pub async fn set_household_value(
        &self,
        household_id: &str,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO household_settings (household_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(household_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(household_id)
        .bind(key)
        .bind(value)
        .bind(to_db_time(&now))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn list_household_values(
        &self,
        household_id: &str,
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT key, value FROM household_settings WHERE household_id = ? ORDER BY key",
        )
        .bind(household_id)
        .fetch_all(self.db.pool())
        .await?;
        rows.iter()
            .map(|r| -> Result<(String, String), sqlx::Error> {
                Ok((r.try_get("key")?, r.try_get("value")?))
            })
            .collect()
    }
}
