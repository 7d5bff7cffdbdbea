//! Periodic status pass: overdue reporting, handoff prompts, missed and
//! elapsed shifts.
//!
//! Every check is safe to repeat. Overdue items are scanned from a stored
//! high-water mark, and each notification is stored once per (kind, instance)
//! before it is sent.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{keys, EngineSettings};
use crate::domain::models::{Notification, NotificationKind, Shift, ShiftStatus};
use crate::domain::ports::{notify_best_effort, Notifier};
use crate::domain::settings_service::SettingsService;
use crate::error::ScheduleResult;
use crate::storage::{
    parse_db_time, to_db_time, ConfigRepository, DbConnection, HouseholdRepository,
    InstanceRepository, NotificationRepository, ShiftRepository,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub overdue_notified: usize,
    pub handoff_prompts: usize,
    pub missed: usize,
    pub auto_completed: usize,
    /// Households whose shift checks failed this pass.
    pub failed_households: usize,
}

#[derive(Clone)]
pub struct StatusChecker {
    db: DbConnection,
    settings_service: SettingsService,
    config_repository: ConfigRepository,
    household_repository: HouseholdRepository,
    instance_repository: InstanceRepository,
    shift_repository: ShiftRepository,
    notification_repository: NotificationRepository,
    notifier: Arc<dyn Notifier>,
}

impl StatusChecker {
    pub fn new(db: DbConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings_service: SettingsService::new(db.clone()),
            config_repository: ConfigRepository::new(db.clone()),
            household_repository: HouseholdRepository::new(db.clone()),
            instance_repository: InstanceRepository::new(db.clone()),
            shift_repository: ShiftRepository::new(db.clone()),
            notification_repository: NotificationRepository::new(db.clone()),
            db,
            notifier,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> ScheduleResult<StatusReport> {
        let base = self.settings_service.process_settings().await?;
        let mut report = StatusReport {
            overdue_notified: self.check_overdue(&base, now).await?,
            auto_completed: self.complete_elapsed_shifts(now).await?,
            ..StatusReport::default()
        };

        for household_id in self.household_repository.list_household_ids().await? {
            let settings = self
                .settings_service
                .household_settings_over(&base, &household_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(household_id = %household_id, "using process settings: {}", e);
                    base.clone()
                });

            match self.check_handoffs(&household_id, &settings, now).await {
                Ok(n) => report.handoff_prompts += n,
                Err(e) => {
                    error!(household_id = %household_id, "handoff check failed: {}", e);
                    report.failed_households += 1;
                    continue;
                }
            }
            match self.check_missed_shifts(&household_id, &settings, now).await {
                Ok(n) => report.missed += n,
                Err(e) => {
                    error!(household_id = %household_id, "missed-shift check failed: {}", e);
                    report.failed_households += 1;
                }
            }
        }

        info!(
            overdue = report.overdue_notified,
            handoffs = report.handoff_prompts,
            missed = report.missed,
            completed = report.auto_completed,
            "status check finished"
        );
        Ok(report)
    }

    async fn notify_once(&self, notification: Notification, now: DateTime<Utc>) -> ScheduleResult<bool> {
        if !self.notification_repository.record_once(&notification, now).await? {
            return Ok(false);
        }
        notify_best_effort(self.notifier.as_ref(), &notification).await;
        Ok(true)
    }

    /// Report pending items whose instant passed since the previous check.
    ///
    /// The scan also reaches back one late-grace period, so items created
    /// after the mark already passed their instant are still reported;
    /// `record_once` keeps that from notifying twice.
    async fn check_overdue(&self, settings: &EngineSettings, now: DateTime<Utc>) -> ScheduleResult<usize> {
        let after = match self
            .config_repository
            .get_value(keys::OVERDUE_CHECKED_THROUGH)
            .await?
        {
            Some(value) => parse_db_time(&value)?,
            None => now - Duration::from_std(settings.status_interval).unwrap_or(Duration::minutes(5)),
        };
        if after >= now {
            debug!("overdue check already covered this instant");
            return Ok(0);
        }

        let from = after.min(now - settings.late_grace);

        let mut notified = 0;
        for task in self.instance_repository.list_tasks_newly_overdue(from, now).await? {
            let notification = Notification {
                household_id: task.household_id,
                kind: NotificationKind::TaskOverdue,
                ref_id: task.id,
                title: "Task overdue".to_string(),
                body: format!("A task scheduled for {} has not been completed.", to_db_time(&task.scheduled_at)),
            };
            if self.notify_once(notification, now).await? {
                notified += 1;
            }
        }
        for log in self
            .instance_repository
            .list_administrations_newly_overdue(from, now)
            .await?
        {
            let notification = Notification {
                household_id: log.household_id,
                kind: NotificationKind::MedicationOverdue,
                ref_id: log.id,
                title: "Medication overdue".to_string(),
                body: format!("A dose scheduled for {} has not been recorded.", to_db_time(&log.scheduled_at)),
            };
            if self.notify_once(notification, now).await? {
                notified += 1;
            }
        }

        self.config_repository
            .set_value(keys::OVERDUE_CHECKED_THROUGH, &to_db_time(&now), now)
            .await?;
        Ok(notified)
    }

    async fn check_handoffs(
        &self,
        household_id: &str,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> ScheduleResult<usize> {
        let mut prompted = 0;
        for shift in self
            .shift_repository
            .list_ending_without_handoff(household_id, now, now + settings.handoff_lead)
            .await?
        {
            let notification = Notification {
                household_id: shift.household_id.clone(),
                kind: NotificationKind::HandoffPrompt,
                ref_id: shift.id.clone(),
                title: "Shift ending soon".to_string(),
                body: format!("The shift ending at {} has no handoff notes yet.", to_db_time(&shift.ends_at)),
            };
            if self.notify_once(notification, now).await? {
                prompted += 1;
            }
        }
        Ok(prompted)
    }

    /// Scheduled shifts never clocked into are moved to missed once the
    /// grace period after their start has elapsed.
    async fn check_missed_shifts(
        &self,
        household_id: &str,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> ScheduleResult<usize> {
        let cutoff = now - settings.missed_shift_grace;
        let mut missed = 0;
        for shift in self
            .shift_repository
            .list_unstarted_before(household_id, cutoff)
            .await?
        {
            if !self.transition(&shift, ShiftStatus::Missed).await? {
                continue;
            }
            missed += 1;
            warn!(household_id, shift_id = %shift.id, caregiver_id = %shift.caregiver_id, "shift missed");
            let notification = Notification {
                household_id: shift.household_id.clone(),
                kind: NotificationKind::ShiftMissed,
                ref_id: shift.id.clone(),
                title: "Shift missed".to_string(),
                body: format!("No one clocked in for the shift starting at {}.", to_db_time(&shift.starts_at)),
            };
            self.notify_once(notification, now).await?;
        }
        Ok(missed)
    }

    /// Active shifts whose end time passed without a clock-out are completed.
    async fn complete_elapsed_shifts(&self, now: DateTime<Utc>) -> ScheduleResult<usize> {
        let mut completed = 0;
        for shift in self.shift_repository.list_active_ended(now).await? {
            if self.transition(&shift, ShiftStatus::Completed).await? {
                completed += 1;
            }
        }
        Ok(completed)
    }

    async fn transition(&self, shift: &Shift, next: ShiftStatus) -> ScheduleResult<bool> {
        if !shift.status.can_transition_to(next) {
            return Ok(false);
        }
        let mut updated = shift.clone();
        updated.status = next;
        let mut conn = self.db.pool().acquire().await?;
        let moved = ShiftRepository::update_if_status(&mut conn, &updated, shift.status).await?;
        if !moved {
            debug!(shift_id = %shift.id, "shift moved before status check");
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{GenerationEngine, TemplateSelector};
    use crate::domain::models::{CareRecipient, InstanceRow};
    use crate::domain::ports::GenerationGate;
    use crate::domain::shift_service::ShiftService;
    use crate::domain::test_utils::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn count(&self, kind: NotificationKind) -> usize {
            self.sent.lock().unwrap().iter().filter(|n| n.kind == kind).count()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    async fn generate(db: &DbConnection, recipient: &CareRecipient, now: DateTime<Utc>) {
        GenerationEngine::new(db.clone(), GenerationGate::new())
            .generate_recipient(recipient, TemplateSelector::All, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missed_shift_grace_boundary() {
        let db = DbConnection::init_test().await.unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let checker = StatusChecker::new(db.db.clone(), notifier.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        create_shift_template(&db, &recipient, daily(&["09:00"]), 240).await;
        create_shift_template(&db, &recipient, daily(&["09:02"]), 240).await;
        let now = utc("2026-03-01T09:31:00Z");
        generate(&db, &recipient, now).await;

        let report = checker.run(now).await.unwrap();
        assert_eq!(report.missed, 1);

        let shifts = ShiftRepository::new(db.db.clone())
            .list_shifts_between(&recipient.id, utc("2026-03-01T00:00:00Z"), utc("2026-03-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(shifts[0].starts_at, utc("2026-03-01T09:00:00Z"));
        assert_eq!(shifts[0].status, ShiftStatus::Missed);
        assert_eq!(shifts[1].status, ShiftStatus::Scheduled);
        assert_eq!(notifier.count(NotificationKind::ShiftMissed), 1);

        let again = checker.run(now).await.unwrap();
        assert_eq!(again.missed, 0);
    }

    #[tokio::test]
    async fn test_handoff_prompt_fires_once() {
        let db = DbConnection::init_test().await.unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let checker = StatusChecker::new(db.db.clone(), notifier.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        create_shift_template(&db, &recipient, daily(&["09:00"]), 480).await;
        generate(&db, &recipient, utc("2026-03-01T06:00:00Z")).await;

        let shift = ShiftRepository::new(db.db.clone())
            .list_shifts_between(&recipient.id, utc("2026-03-01T00:00:00Z"), utc("2026-03-02T00:00:00Z"))
            .await
            .unwrap()
            .remove(0);
        ShiftService::new(db.db.clone())
            .clock_in(&household.id, &shift.id, utc("2026-03-01T09:00:00Z"))
            .await
            .unwrap();

        let first = checker.run(utc("2026-03-01T16:40:00Z")).await.unwrap();
        let second = checker.run(utc("2026-03-01T16:45:00Z")).await.unwrap();

        assert_eq!(first.handoff_prompts, 1);
        assert_eq!(second.handoff_prompts, 0);
        assert_eq!(notifier.count(NotificationKind::HandoffPrompt), 1);
    }

    #[tokio::test]
    async fn test_elapsed_active_shift_completes() {
        let db = DbConnection::init_test().await.unwrap();
        let checker = StatusChecker::new(db.db.clone(), Arc::new(RecordingNotifier::default()));
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        create_shift_template(&db, &recipient, daily(&["09:00"]), 480).await;
        generate(&db, &recipient, utc("2026-03-01T06:00:00Z")).await;

        let service = ShiftService::new(db.db.clone());
        let shift = ShiftRepository::new(db.db.clone())
            .list_shifts_between(&recipient.id, utc("2026-03-01T00:00:00Z"), utc("2026-03-02T00:00:00Z"))
            .await
            .unwrap()
            .remove(0);
        service
            .clock_in(&household.id, &shift.id, utc("2026-03-01T09:00:00Z"))
            .await
            .unwrap();

        let report = checker.run(utc("2026-03-01T17:05:00Z")).await.unwrap();
        assert_eq!(report.auto_completed, 1);
        let stored = service.get_shift(&household.id, &shift.id).await.unwrap();
        assert_eq!(stored.status, ShiftStatus::Completed);
        assert_eq!(stored.clock_out_at, None);
    }

    #[tokio::test]
    async fn test_overdue_reported_once() {
        let db = DbConnection::init_test().await.unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let checker = StatusChecker::new(db.db.clone(), notifier.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        create_task_template(&db, &recipient, daily(&["08:00"])).await;
        let medication = create_medication(&db, &recipient, false).await;
        add_medication_schedule(&db, &medication, daily(&["08:00"])).await;
        generate(&db, &recipient, utc("2026-03-01T06:00:00Z")).await;

        let before = checker.run(utc("2026-03-01T07:00:00Z")).await.unwrap();
        let due = checker.run(utc("2026-03-01T08:05:00Z")).await.unwrap();
        let after = checker.run(utc("2026-03-01T08:10:00Z")).await.unwrap();

        assert_eq!(before.overdue_notified, 0);
        assert_eq!(due.overdue_notified, 2);
        assert_eq!(after.overdue_notified, 0);
        assert_eq!(notifier.count(NotificationKind::TaskOverdue), 1);
        assert_eq!(notifier.count(NotificationKind::MedicationOverdue), 1);
        let stored = NotificationRepository::new(db.db.clone())
            .count_for_household(&household.id, NotificationKind::TaskOverdue.as_str())
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn test_late_entry_behind_mark_is_reported() {
        let db = DbConnection::init_test().await.unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let checker = StatusChecker::new(db.db.clone(), notifier.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;

        checker.run(utc("2026-03-01T08:30:00Z")).await.unwrap();

        let task = pending_task(&recipient, None, utc("2026-03-01T08:00:00Z"));
        let mut conn = db.pool().acquire().await.unwrap();
        InstanceRepository::insert_if_absent(&mut conn, &InstanceRow::Task(task))
            .await
            .unwrap();
        drop(conn);

        let late = checker.run(utc("2026-03-01T08:35:00Z")).await.unwrap();
        let again = checker.run(utc("2026-03-01T08:40:00Z")).await.unwrap();
        assert_eq!(late.overdue_notified, 1);
        assert_eq!(again.overdue_notified, 0);
        assert_eq!(notifier.count(NotificationKind::TaskOverdue), 1);
    }
}
