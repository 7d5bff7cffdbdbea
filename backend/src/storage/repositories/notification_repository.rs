use chrono::{DateTime, Utc};

use crate::domain::models::{generate_id, Notification};
use crate::storage::{to_db_time, DbConnection};

/// Persisted notifications; the (kind, ref) pair doubles as the
/// "already told them" marker for status checks
#[derive(Clone)]
pub struct NotificationRepository {
    db: DbConnection,
}

impl NotificationRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a notification unless one of the same kind already exists for
    /// the same instance. Returns true when this call stored it.
    pub async fn record_once(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, household_id, kind, ref_id, title, body, is_read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(generate_id())
        .bind(&notification.household_id)
        .bind(notification.kind.as_str())
        .bind(&notification.ref_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(to_db_time(&now))
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Count stored notifications of a kind for a household
    pub async fn count_for_household(
        &self,
        household_id: &str,
        kind: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE household_id = ? AND kind = ?",
        )
        .bind(household_id)
        .bind(kind)
        .fetch_one(self.db.pool())
        .await
    }
}
