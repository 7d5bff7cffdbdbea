//! # Generation Engine
//!
//! Materializes concrete instances from recurring templates over a rolling
//! window that always starts at the recipient's local "today".
//!
//! All three template kinds go through one loop via [`TemplateSource`], which
//! answers the per-kind questions: does the rule match this date, which
//! instants does it resolve to, and what row does an instant become.
//!
//! Idempotency rests on the storage layer: every insert is
//! insert-or-ignore against a partial unique index, so re-running over the
//! same window creates nothing and two racing writers both succeed.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::config::EngineSettings;
use crate::domain::local_time::{resolve_instant, today_in};
use crate::domain::models::{
    generate_id, AdministrationStatus, CareRecipient, InstanceRow, MedicationAdministration,
    ScheduledMedication, Shift, ShiftStatus, ShiftTemplate, TaskInstance, TaskStatus,
    TaskTemplate,
};
use crate::domain::ports::GenerationGate;
use crate::domain::recurrence::RecurrenceRule;
use crate::domain::settings_service::SettingsService;
use crate::error::ScheduleResult;
use crate::storage::{
    DbConnection, HouseholdRepository, InstanceRepository, MedicationRepository,
    ShiftTemplateRepository, TaskTemplateRepository,
};

/// One template of any kind, as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    Task(TaskTemplate),
    Medication(ScheduledMedication),
    Shift(ShiftTemplate),
}

impl TemplateSource {
    pub fn rule(&self) -> &RecurrenceRule {
        match self {
            TemplateSource::Task(t) => &t.rule,
            TemplateSource::Medication(m) => &m.schedule.rule,
            TemplateSource::Shift(s) => &s.rule,
        }
    }

    /// The id instances point back at: template id, or schedule id for medications.
    pub fn source_id(&self) -> &str {
        match self {
            TemplateSource::Task(t) => &t.id,
            TemplateSource::Medication(m) => &m.schedule.id,
            TemplateSource::Shift(s) => &s.id,
        }
    }

    /// Inactive templates and as-needed medications never generate.
    pub fn is_generatable(&self) -> bool {
        match self {
            TemplateSource::Task(t) => t.is_active,
            TemplateSource::Medication(m) => {
                m.medication.is_active && m.schedule.is_active && !m.medication.is_prn
            }
            TemplateSource::Shift(s) => s.is_active,
        }
    }

    pub fn matches_date(&self, date: NaiveDate) -> bool {
        self.rule().matches_date(date)
    }

    /// Absolute instants of every occurrence on `date`, in rule order.
    pub fn resolve_instants(&self, date: NaiveDate, tz: Tz) -> Vec<DateTime<Utc>> {
        self.rule()
            .times_of_day
            .iter()
            .map(|time| resolve_instant(date, *time, tz))
            .collect()
    }

    /// A fresh pending row at `at`, with content copied from the template.
    pub fn build_instance_row(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> InstanceRow {
        match self {
            TemplateSource::Task(t) => InstanceRow::Task(TaskInstance {
                id: generate_id(),
                household_id: t.household_id.clone(),
                recipient_id: t.recipient_id.clone(),
                template_id: Some(t.id.clone()),
                title_enc: t.title_enc.clone(),
                description_enc: t.description_enc.clone(),
                category: t.category.clone(),
                assigned_to: t.assigned_to.clone(),
                scheduled_at: at,
                status: TaskStatus::Pending,
                notes_enc: None,
                completed_at: None,
                completed_by: None,
                deleted_at: None,
                created_at: now,
            }),
            TemplateSource::Medication(m) => InstanceRow::Medication(MedicationAdministration {
                id: generate_id(),
                household_id: m.medication.household_id.clone(),
                recipient_id: m.medication.recipient_id.clone(),
                medication_id: m.medication.id.clone(),
                schedule_id: Some(m.schedule.id.clone()),
                dosage_enc: m.medication.dosage_enc.clone(),
                scheduled_at: at,
                status: AdministrationStatus::Pending,
                notes_enc: None,
                administered_at: None,
                administered_by: None,
                deleted_at: None,
                created_at: now,
            }),
            TemplateSource::Shift(s) => InstanceRow::Shift(Shift {
                id: generate_id(),
                household_id: s.household_id.clone(),
                recipient_id: s.recipient_id.clone(),
                template_id: Some(s.id.clone()),
                caregiver_id: s.caregiver_id.clone(),
                title_enc: s.title_enc.clone(),
                starts_at: at,
                ends_at: at + Duration::minutes(i64::from(s.duration_minutes)),
                status: ShiftStatus::Scheduled,
                clock_in_at: None,
                clock_out_at: None,
                notes_enc: None,
                deleted_at: None,
                created_at: now,
            }),
        }
    }
}

/// Which of a recipient's templates a generation pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSelector<'a> {
    All,
    TaskTemplate(&'a str),
    MedicationSchedule(&'a str),
    /// Every schedule of one medication.
    Medication(&'a str),
    ShiftTemplate(&'a str),
}

impl TemplateSelector<'_> {
    fn wants_tasks(&self) -> bool {
        matches!(self, TemplateSelector::All | TemplateSelector::TaskTemplate(_))
    }

    fn wants_medications(&self) -> bool {
        matches!(
            self,
            TemplateSelector::All
                | TemplateSelector::MedicationSchedule(_)
                | TemplateSelector::Medication(_)
        )
    }

    fn wants_shifts(&self) -> bool {
        matches!(self, TemplateSelector::All | TemplateSelector::ShiftTemplate(_))
    }

    fn selects(&self, source: &TemplateSource) -> bool {
        match (self, source) {
            (TemplateSelector::All, _) => true,
            (TemplateSelector::TaskTemplate(id), TemplateSource::Task(t)) => t.id == *id,
            (TemplateSelector::MedicationSchedule(id), TemplateSource::Medication(m)) => {
                m.schedule.id == *id
            }
            (TemplateSelector::Medication(id), TemplateSource::Medication(m)) => {
                m.medication.id == *id
            }
            (TemplateSelector::ShiftTemplate(id), TemplateSource::Shift(s)) => s.id == *id,
            _ => false,
        }
    }
}

/// Half-open range of local calendar dates `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GenerationWindow {
    /// `[today_local, today_local + days)` for a recipient in `tz`.
    pub fn starting_today(tz: Tz, now: DateTime<Utc>, days: u32) -> Self {
        let start = today_in(tz, now);
        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

/// A recipient whose generation failed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientFailure {
    pub household_id: String,
    pub recipient_id: String,
    pub error: String,
}

/// Outcome of a pass over every household.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    pub recipients: usize,
    pub created: u64,
    pub failures: Vec<RecipientFailure>,
    /// True when the pass was skipped because generation is suspended.
    pub suspended: bool,
}

/// Service wrapping the generation loop with transactions, settings and the
/// suspend gate
#[derive(Clone)]
pub struct GenerationEngine {
    db: DbConnection,
    household_repository: HouseholdRepository,
    settings_service: SettingsService,
    gate: GenerationGate,
}

impl GenerationEngine {
    pub fn new(db: DbConnection, gate: GenerationGate) -> Self {
        Self {
            household_repository: HouseholdRepository::new(db.clone()),
            settings_service: SettingsService::new(db.clone()),
            db,
            gate,
        }
    }

    pub fn gate(&self) -> &GenerationGate {
        &self.gate
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings_service
    }

    /// Insert every occurrence of `templates` within `window`.
    ///
    /// Dates before the recipient's local today are never generated. On
    /// today itself, instants older than `late_grace` are skipped. Returns
    /// the number of rows created; conflicts count as zero.
    pub async fn generate(
        conn: &mut SqliteConnection,
        tz: Tz,
        templates: &[TemplateSource],
        window: GenerationWindow,
        now: DateTime<Utc>,
        late_grace: Duration,
    ) -> ScheduleResult<u64> {
        let today = today_in(tz, now);
        let window = GenerationWindow {
            start: window.start.max(today),
            end: window.end,
        };
        let late_cutoff = now - late_grace;
        let mut created = 0;

        for template in templates.iter().filter(|t| t.is_generatable()) {
            for date in window.dates() {
                if !template.matches_date(date) {
                    continue;
                }
                for at in template.resolve_instants(date, tz) {
                    if date == today && at < late_cutoff {
                        debug!(source_id = template.source_id(), %at, "skipping late occurrence");
                        continue;
                    }
                    let row = template.build_instance_row(at, now);
                    if InstanceRepository::insert_if_absent(conn, &row).await? {
                        created += 1;
                    }
                }
            }
        }

        Ok(created)
    }

    /// Load a recipient's active templates matching `selector`.
    pub async fn load_templates(
        conn: &mut SqliteConnection,
        recipient_id: &str,
        selector: TemplateSelector<'_>,
    ) -> ScheduleResult<Vec<TemplateSource>> {
        let mut sources = Vec::new();
        if selector.wants_tasks() {
            for template in TaskTemplateRepository::list_active_for_recipient(conn, recipient_id).await?
            {
                sources.push(TemplateSource::Task(template));
            }
        }
        if selector.wants_medications() {
            for scheduled in MedicationRepository::list_scheduled_for_recipient(conn, recipient_id).await?
            {
                sources.push(TemplateSource::Medication(scheduled));
            }
        }
        if selector.wants_shifts() {
            for template in ShiftTemplateRepository::list_active_for_recipient(conn, recipient_id).await?
            {
                sources.push(TemplateSource::Shift(template));
            }
        }
        sources.retain(|s| selector.selects(s));
        Ok(sources)
    }

    /// Load and generate inside the caller's transaction.
    pub async fn generate_in(
        conn: &mut SqliteConnection,
        recipient: &CareRecipient,
        selector: TemplateSelector<'_>,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        let tz = recipient.tz()?;
        let templates = Self::load_templates(conn, &recipient.id, selector).await?;
        let window = GenerationWindow::starting_today(tz, now, settings.window_days);
        Self::generate(conn, tz, &templates, window, now, settings.late_grace).await
    }

    /// Generate for one recipient in its own transaction, using the
    /// household's settings.
    pub async fn generate_recipient(
        &self,
        recipient: &CareRecipient,
        selector: TemplateSelector<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        let settings = self
            .settings_service
            .household_settings(&recipient.household_id)
            .await?;
        self.generate_recipient_with(recipient, selector, &settings, now)
            .await
    }

    pub async fn generate_recipient_with(
        &self,
        recipient: &CareRecipient,
        selector: TemplateSelector<'_>,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        if self.gate.is_suspended() {
            debug!(recipient_id = %recipient.id, "generation suspended, skipping recipient");
            return Ok(0);
        }
        // Fail before taking the write lock.
        recipient.tz()?;

        let mut tx = self.db.pool().begin().await?;
        let created = Self::generate_in(&mut tx, recipient, selector, settings, now).await?;
        tx.commit().await?;

        if created > 0 {
            info!(
                household_id = %recipient.household_id,
                recipient_id = %recipient.id,
                created,
                "generated instances"
            );
        }
        Ok(created)
    }

    /// Generate for every active recipient of every household.
    ///
    /// A failing recipient is logged and recorded in the report; its
    /// siblings still run.
    pub async fn generate_all(&self, now: DateTime<Utc>) -> ScheduleResult<GenerationReport> {
        if self.gate.is_suspended() {
            info!("generation suspended, skipping run");
            return Ok(GenerationReport {
                suspended: true,
                ..GenerationReport::default()
            });
        }

        let base = self.settings_service.process_settings().await?;
        let mut report = GenerationReport::default();

        for household_id in self.household_repository.list_household_ids().await? {
            let settings = match self
                .settings_service
                .household_settings_over(&base, &household_id)
                .await
            {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(household_id = %household_id, "using process settings: {}", e);
                    base.clone()
                }
            };

            let recipients = match self
                .household_repository
                .list_active_recipients(&household_id)
                .await
            {
                Ok(recipients) => recipients,
                Err(e) => {
                    error!(household_id = %household_id, "failed to list recipients: {}", e);
                    continue;
                }
            };

            for recipient in recipients {
                report.recipients += 1;
                match self
                    .generate_recipient_with(&recipient, TemplateSelector::All, &settings, now)
                    .await
                {
                    Ok(created) => report.created += created,
                    Err(e) => {
                        error!(
                            household_id = %recipient.household_id,
                            recipient_id = %recipient.id,
                            configuration = e.is_configuration(),
                            "generation failed for recipient: {}",
                            e
                        );
                        report.failures.push(RecipientFailure {
                            household_id: recipient.household_id.clone(),
                            recipient_id: recipient.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            recipients = report.recipients,
            created = report.created,
            failures = report.failures.len(),
            "generation run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::local_time::parse_timezone;
    use crate::domain::test_utils::*;
    use crate::storage::TestDb;

    async fn setup(timezone: &str) -> (TestDb, GenerationEngine, CareRecipient) {
        let db = DbConnection::init_test().await.unwrap();
        let engine = GenerationEngine::new(db.db.clone(), GenerationGate::new());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, timezone).await;
        (db, engine, recipient)
    }

    async fn task_times(db: &DbConnection, recipient: &CareRecipient) -> Vec<DateTime<Utc>> {
        InstanceRepository::new(db.clone())
            .list_tasks_between(
                &recipient.id,
                utc("2000-01-01T00:00:00Z"),
                utc("2100-01-01T00:00:00Z"),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.scheduled_at)
            .collect()
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let (db, engine, recipient) = setup("UTC").await;
        create_task_template(&db, &recipient, daily(&["08:00", "20:00"])).await;
        let now = utc("2026-03-01T06:00:00Z");

        let first = engine
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();
        let before = task_times(&db, &recipient).await;
        let second = engine
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();

        assert_eq!(first, 6);
        assert_eq!(second, 0);
        assert_eq!(task_times(&db, &recipient).await, before);
    }

    #[tokio::test]
    async fn test_daily_rule_across_spring_forward() {
        let (db, engine, recipient) = setup("America/New_York").await;
        create_task_template(&db, &recipient, daily(&["08:00"])).await;
        // Midnight EST on 2026-03-08.
        let now = utc("2026-03-08T05:00:00Z");

        let created = engine
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();

        assert_eq!(created, 3);
        assert_eq!(
            task_times(&db, &recipient).await,
            vec![
                utc("2026-03-08T13:00:00Z"),
                utc("2026-03-09T12:00:00Z"),
                utc("2026-03-10T12:00:00Z"),
            ]
        );
    }

    #[tokio::test]
    async fn test_late_occurrences_today_are_skipped() {
        let (db, _engine, recipient) = setup("UTC").await;
        let template = create_task_template(&db, &recipient, daily(&["08:00", "14:00", "18:00"])).await;
        let tz = parse_timezone("UTC").unwrap();
        let now = utc("2026-03-01T15:00:00Z");
        let window = GenerationWindow::starting_today(tz, now, 1);

        let mut tx = db.pool().begin().await.unwrap();
        let created = GenerationEngine::generate(
            &mut tx,
            tz,
            &[TemplateSource::Task(template)],
            window,
            now,
            Duration::hours(2),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(created, 2);
        assert_eq!(
            task_times(&db, &recipient).await,
            vec![utc("2026-03-01T14:00:00Z"), utc("2026-03-01T18:00:00Z")]
        );
    }

    #[tokio::test]
    async fn test_past_days_are_never_backfilled() {
        let (db, engine, recipient) = setup("UTC").await;
        create_task_template(&db, &recipient, daily(&["09:00"])).await;

        engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();
        // Two days of outage, then the next run.
        let created = engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-05T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(created, 3);
        assert_eq!(
            task_times(&db, &recipient).await,
            vec![
                utc("2026-03-01T09:00:00Z"),
                utc("2026-03-02T09:00:00Z"),
                utc("2026-03-03T09:00:00Z"),
                utc("2026-03-05T09:00:00Z"),
                utc("2026-03-06T09:00:00Z"),
                utc("2026-03-07T09:00:00Z"),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_window_in_the_past_is_clamped_to_today() {
        let (db, _engine, recipient) = setup("UTC").await;
        let template = create_task_template(&db, &recipient, daily(&["09:00"])).await;
        let tz = parse_timezone("UTC").unwrap();
        let now = utc("2026-03-05T06:00:00Z");
        let window = GenerationWindow {
            start: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
        };

        let mut tx = db.pool().begin().await.unwrap();
        let created = GenerationEngine::generate(
            &mut tx,
            tz,
            &[TemplateSource::Task(template)],
            window,
            now,
            Duration::hours(2),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(created, 1);
        assert_eq!(task_times(&db, &recipient).await, vec![utc("2026-03-05T09:00:00Z")]);
    }

    #[tokio::test]
    async fn test_prn_and_inactive_sources_do_not_generate() {
        let (db, engine, recipient) = setup("UTC").await;
        let prn = create_medication(&db, &recipient, true).await;
        add_medication_schedule(&db, &prn, daily(&["08:00"])).await;

        let mut template = create_task_template(&db, &recipient, daily(&["08:00"])).await;
        template.is_active = false;
        let mut conn = db.pool().acquire().await.unwrap();
        TaskTemplateRepository::update_template(&mut conn, &template)
            .await
            .unwrap();
        drop(conn);

        let created = engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(created, 0);
    }

    #[tokio::test]
    async fn test_medication_schedules_are_keyed_separately() {
        let (db, engine, recipient) = setup("UTC").await;
        let medication = create_medication(&db, &recipient, false).await;
        add_medication_schedule(&db, &medication, daily(&["08:00"])).await;
        add_medication_schedule(&db, &medication, daily(&["08:00"])).await;

        let created = engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();

        // Same medication and instant, two schedules: both survive.
        assert_eq!(created, 6);
    }

    #[tokio::test]
    async fn test_shifts_carry_duration() {
        let (db, engine, recipient) = setup("UTC").await;
        create_shift_template(&db, &recipient, weekly(&["09:00"], &[0]), 480).await;
        // 2026-03-01 is a Sunday.
        let created = engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();
        assert_eq!(created, 1);

        let shifts = crate::storage::ShiftRepository::new(db.db.clone())
            .list_shifts_between(
                &recipient.id,
                utc("2026-03-01T00:00:00Z"),
                utc("2026-03-08T00:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].starts_at, utc("2026-03-01T09:00:00Z"));
        assert_eq!(shifts[0].ends_at, utc("2026-03-01T17:00:00Z"));
        assert_eq!(shifts[0].status, ShiftStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_failing_recipient_does_not_stop_siblings() {
        let db = DbConnection::init_test().await.unwrap();
        let engine = GenerationEngine::new(db.db.clone(), GenerationGate::new());
        let household = create_household(&db).await;
        let broken = create_recipient(&db, &household.id, "Mars/Olympus_Mons").await;
        let healthy = create_recipient(&db, &household.id, "Europe/London").await;
        create_task_template(&db, &broken, daily(&["08:00"])).await;
        create_task_template(&db, &healthy, daily(&["08:00"])).await;

        let report = engine.generate_all(utc("2026-03-01T06:00:00Z")).await.unwrap();

        assert_eq!(report.recipients, 2);
        assert_eq!(report.created, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipient_id, broken.id);
        assert_eq!(task_times(&db, &healthy).await.len(), 3);
    }

    #[tokio::test]
    async fn test_suspended_gate_skips_then_catches_up() {
        let (db, engine, recipient) = setup("UTC").await;
        create_task_template(&db, &recipient, daily(&["08:00"])).await;
        let now = utc("2026-03-01T06:00:00Z");

        let guard = engine.gate().suspend();
        let report = engine.generate_all(now).await.unwrap();
        assert!(report.suspended);
        assert_eq!(report.created, 0);
        assert_eq!(
            engine
                .generate_recipient(&recipient, TemplateSelector::All, now)
                .await
                .unwrap(),
            0
        );

        drop(guard);
        let report = engine.generate_all(now).await.unwrap();
        assert!(!report.suspended);
        assert_eq!(report.created, 3);
    }

    #[tokio::test]
    async fn test_selector_limits_generation_to_one_template() {
        let (db, engine, recipient) = setup("UTC").await;
        let first = create_task_template(&db, &recipient, daily(&["08:00"])).await;
        create_task_template(&db, &recipient, daily(&["09:00"])).await;

        let created = engine
            .generate_recipient(
                &recipient,
                TemplateSelector::TaskTemplate(&first.id),
                utc("2026-03-01T06:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(created, 3);
    }
}
