use chrono::{DateTime, Utc};

use crate::storage::{to_db_time, DbConnection};

/// Rows removed by one housekeeping pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub sessions: u64,
    pub login_attempts: u64,
    pub notifications: u64,
}

impl PruneCounts {
    pub fn total(&self) -> u64 {
        self.sessions + self.login_attempts + self.notifications
    }
}

/// Hard deletes of transient records
#[derive(Clone)]
pub struct HousekeepingRepository {
    db: DbConnection,
}

impl HousekeepingRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(to_db_time(&now))
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_login_attempts_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(to_db_time(&cutoff))
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Unread notifications are kept regardless of age.
    pub async fn delete_settled_notifications_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE created_at < ?
              AND (is_read = TRUE OR dismissed_at IS NOT NULL)
            "#,
        )
        .bind(to_db_time(&cutoff))
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
