use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::domain::settings_service::SettingsService;
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HousekeepingRepository, PruneCounts};

/// Prunes transient records: expired sessions, old login attempts, and
/// notifications that were read or dismissed long ago
#[derive(Clone)]
pub struct HousekeepingService {
    settings_service: SettingsService,
    housekeeping_repository: HousekeepingRepository,
}

impl HousekeepingService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            settings_service: SettingsService::new(db.clone()),
            housekeeping_repository: HousekeepingRepository::new(db),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> ScheduleResult<PruneCounts> {
        let settings = self.settings_service.process_settings().await?;
        let login_cutoff = cutoff(now, settings.login_attempt_retention)?;
        let notification_cutoff = cutoff(now, settings.notification_retention)?;

        let counts = PruneCounts {
            sessions: self.housekeeping_repository.delete_expired_sessions(now).await?,
            login_attempts: self
                .housekeeping_repository
                .delete_login_attempts_before(login_cutoff)
                .await?,
            notifications: self
                .housekeeping_repository
                .delete_settled_notifications_before(notification_cutoff)
                .await?,
        };

        info!(
            sessions = counts.sessions,
            login_attempts = counts.login_attempts,
            notifications = counts.notifications,
            "housekeeping finished"
        );
        Ok(counts)
    }
}

fn cutoff(now: DateTime<Utc>, retention: Duration) -> ScheduleResult<DateTime<Utc>> {
    now.checked_sub_signed(retention).ok_or_else(|| {
        ScheduleError::Validation(format!("retention of {} days is out of range", retention.num_days()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use crate::domain::test_utils::utc;
    use crate::storage::ConfigRepository;

    async fn seed(db: &DbConnection) {
        let statements = [
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES \
             ('s-old', 'u1', '2026-02-28T00:00:00Z', '2026-02-01T00:00:00Z'), \
             ('s-live', 'u1', '2026-03-02T00:00:00Z', '2026-02-01T00:00:00Z')",
            "INSERT INTO login_attempts (email_hash, success, attempted_at) VALUES \
             ('h1', FALSE, '2026-02-01T00:00:00Z'), \
             ('h1', TRUE, '2026-02-28T00:00:00Z')",
            "INSERT INTO notifications (id, household_id, kind, ref_id, title, body, is_read, dismissed_at, created_at) VALUES \
             ('n-read', 'h', 'task_overdue', 'r1', 't', 'b', TRUE, NULL, '2025-10-01T00:00:00Z'), \
             ('n-dismissed', 'h', 'task_overdue', 'r2', 't', 'b', FALSE, '2025-10-02T00:00:00Z', '2025-10-01T00:00:00Z'), \
             ('n-unread', 'h', 'task_overdue', 'r3', 't', 'b', FALSE, NULL, '2025-10-01T00:00:00Z'), \
             ('n-recent', 'h', 'task_overdue', 'r4', 't', 'b', TRUE, NULL, '2026-02-27T00:00:00Z')",
        ];
        for sql in statements {
            sqlx::query(sql).execute(db.pool()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_prunes_only_settled_and_expired_rows() {
        let db = DbConnection::init_test().await.unwrap();
        seed(&db).await;
        let service = HousekeepingService::new(db.db.clone());

        let counts = service.run(utc("2026-03-01T00:00:00Z")).await.unwrap();

        assert_eq!(
            counts,
            PruneCounts {
                sessions: 1,
                login_attempts: 1,
                notifications: 2,
            }
        );
        let unread: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE id = 'n-unread'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(unread, 1);

        let again = service.run(utc("2026-03-01T00:00:00Z")).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_oversized_retention_is_rejected_and_ignored() {
        let db = DbConnection::init_test().await.unwrap();
        let now = utc("2026-03-01T00:00:00Z");
        let settings = SettingsService::new(db.db.clone());
        let err = settings
            .set_process_value(keys::LOGIN_ATTEMPT_RETENTION_DAYS, "100000000", now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));

        // A value stored before the bound existed falls back to the default.
        ConfigRepository::new(db.db.clone())
            .set_value(keys::NOTIFICATION_RETENTION_DAYS, "100000000", now)
            .await
            .unwrap();
        seed(&db).await;
        let counts = HousekeepingService::new(db.db.clone()).run(now).await.unwrap();
        assert_eq!(counts.login_attempts, 1);
        assert_eq!(counts.notifications, 2);
    }

    #[test]
    fn test_cutoff_overflow_is_an_error() {
        let now = utc("2026-03-01T00:00:00Z");
        assert!(cutoff(now, Duration::days(7)).is_ok());
        assert!(cutoff(now, Duration::days(100_000_000)).is_err());
    }
}
