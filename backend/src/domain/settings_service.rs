use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{keys, EngineSettings};
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{ConfigRepository, DbConnection};

/// Resolves engine settings: built-in defaults, then `app_config`, then the
/// household's own overrides
#[derive(Clone)]
pub struct SettingsService {
    config_repository: ConfigRepository,
}

impl SettingsService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            config_repository: ConfigRepository::new(db),
        }
    }

    /// Settings in effect process-wide
    pub async fn process_settings(&self) -> ScheduleResult<EngineSettings> {
        let mut settings = EngineSettings::default();
        for (key, value) in self.config_repository.list_values().await? {
            if !is_internal(&key) {
                settings.apply(&key, &value);
            }
        }
        Ok(settings)
    }

    /// Settings in effect for one household, layered over `base`
    pub async fn household_settings_over(
        &self,
        base: &EngineSettings,
        household_id: &str,
    ) -> ScheduleResult<EngineSettings> {
        let mut settings = base.clone();
        for (key, value) in self
            .config_repository
            .list_household_values(household_id)
            .await?
        {
            if !settings.apply_household(&key, &value) {
                warn!(household_id, key = %key, "ignoring household setting");
            }
        }
        Ok(settings)
    }

    pub async fn household_settings(&self, household_id: &str) -> ScheduleResult<EngineSettings> {
        let base = self.process_settings().await?;
        self.household_settings_over(&base, household_id).await
    }

    /// Store a process-wide override after checking it would be accepted
    pub async fn set_process_value(
        &self,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<()> {
        if !EngineSettings::default().apply(key, value) {
            return Err(ScheduleError::Validation(format!(
                "invalid value '{}' for setting '{}'",
                value, key
            )));
        }
        self.config_repository.set_value(key, value, now).await?;
        info!(key, value, "updated setting");
        Ok(())
    }

    /// Store a household override after checking it would be accepted
    pub async fn set_household_value(
        &self,
        household_id: &str,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<()> {
        if !EngineSettings::default().apply_household(key, value) {
            return Err(ScheduleError::Validation(format!(
                "invalid household value '{}' for setting '{}'",
                value, key
            )));
        }
        self.config_repository
            .set_household_value(household_id, key, value, now)
            .await?;
        info!(household_id, key, value, "updated household setting");
        Ok(())
    }
}

/// Bookkeeping keys stored alongside settings, e.g. status-check high-water marks.
fn is_internal(key: &str) -> bool {
    key == keys::OVERDUE_CHECKED_THROUGH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_utils::{create_household, utc};
    use chrono::Duration;

    #[tokio::test]
    async fn test_settings_layering() {
        let db = DbConnection::init_test().await.unwrap();
        let service = SettingsService::new(db.db.clone());
        let household = create_household(&db).await;
        let other = create_household(&db).await;
        let now = utc("2026-03-01T12:00:00Z");

        service
            .set_process_value(keys::WINDOW_DAYS, "5", now)
            .await
            .unwrap();
        service
            .set_household_value(&household.id, keys::MISSED_SHIFT_GRACE_MINUTES, "10", now)
            .await
            .unwrap();

        let settings = service.household_settings(&household.id).await.unwrap();
        assert_eq!(settings.window_days, 5);
        assert_eq!(settings.missed_shift_grace, Duration::minutes(10));

        let settings = service.household_settings(&other.id).await.unwrap();
        assert_eq!(settings.window_days, 5);
        assert_eq!(settings.missed_shift_grace, Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_rejects_invalid_values() {
        let db = DbConnection::init_test().await.unwrap();
        let service = SettingsService::new(db.db.clone());
        let household = create_household(&db).await;
        let now = utc("2026-03-01T12:00:00Z");

        let err = service
            .set_process_value(keys::WINDOW_DAYS, "soon", now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));

        // Worker intervals are process-wide only.
        let err = service
            .set_household_value(&household.id, keys::STATUS_INTERVAL_MINUTES, "1", now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));
    }
}
