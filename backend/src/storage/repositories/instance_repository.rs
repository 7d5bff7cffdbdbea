//! Generated and ad-hoc instances: tasks and medication administrations, plus
//! the insert and soft-delete paths shared with shifts.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::models::{
    AdministrationStatus, InstanceRow, MedicationAdministration, TaskInstance, TaskStatus,
};
use crate::storage::{get_opt_time, get_time, to_db_time, DbConnection};

const TASK_COLUMNS: &str = "id, household_id, recipient_id, template_id, title_enc, \
     description_enc, category, assigned_to, scheduled_at, status, notes_enc, completed_at, \
     completed_by, deleted_at, created_at";

const ADMINISTRATION_COLUMNS: &str = "id, household_id, recipient_id, medication_id, \
     schedule_id, dosage_enc, scheduled_at, status, notes_enc, administered_at, \
     administered_by, deleted_at, created_at";

/// Which generated instances a soft delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteScope<'a> {
    TaskTemplate(&'a str),
    MedicationSchedule(&'a str),
    /// Every schedule of one medication.
    Medication(&'a str),
    ShiftTemplate(&'a str),
    /// Every template-generated instance of one recipient.
    Recipient(&'a str),
}

/// Repository for task and medication-administration instances
#[derive(Clone)]
pub struct InstanceRepository {
    db: DbConnection,
}

impl InstanceRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert an instance unless a live row already holds its slot.
    ///
    /// Returns true when a row was written. A uniqueness conflict is the
    /// normal outcome of repeated generation and is reported as false.
    pub async fn insert_if_absent(
        conn: &mut SqliteConnection,
        row: &InstanceRow,
    ) -> Result<bool, sqlx::Error> {
        let result = match row {
            InstanceRow::Task(task) => {
                sqlx::query(
                    r#"
                    INSERT INTO tasks
                        (id, household_id, recipient_id, template_id, title_enc,
                         description_enc, category, assigned_to, scheduled_at, status,
                         notes_enc, completed_at, completed_by, deleted_at, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(&task.id)
                .bind(&task.household_id)
                .bind(&task.recipient_id)
                .bind(&task.template_id)
                .bind(&task.title_enc)
                .bind(&task.description_enc)
                .bind(&task.category)
                .bind(&task.assigned_to)
                .bind(to_db_time(&task.scheduled_at))
                .bind(task.status.as_str())
                .bind(&task.notes_enc)
                .bind(task.completed_at.as_ref().map(to_db_time))
                .bind(&task.completed_by)
                .bind(to_db_time(&task.created_at))
                .execute(&mut *conn)
                .await?
            }
            InstanceRow::Medication(log) => {
                sqlx::query(
                    r#"
                    INSERT INTO medication_logs
                        (id, household_id, recipient_id, medication_id, schedule_id,
                         dosage_enc, scheduled_at, status, notes_enc, administered_at,
                         administered_by, deleted_at, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(&log.id)
                .bind(&log.household_id)
                .bind(&log.recipient_id)
                .bind(&log.medication_id)
                .bind(&log.schedule_id)
                .bind(&log.dosage_enc)
                .bind(to_db_time(&log.scheduled_at))
                .bind(log.status.as_str())
                .bind(&log.notes_enc)
                .bind(log.administered_at.as_ref().map(to_db_time))
                .bind(&log.administered_by)
                .bind(to_db_time(&log.created_at))
                .execute(&mut *conn)
                .await?
            }
            InstanceRow::Shift(shift) => {
                sqlx::query(
                    r#"
                    INSERT INTO shifts
                        (id, household_id, recipient_id, template_id, caregiver_id, title_enc,
                         starts_at, ends_at, status, clock_in_at, clock_out_at, notes_enc,
                         deleted_at, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(&shift.id)
                .bind(&shift.household_id)
                .bind(&shift.recipient_id)
                .bind(&shift.template_id)
                .bind(&shift.caregiver_id)
                .bind(&shift.title_enc)
                .bind(to_db_time(&shift.starts_at))
                .bind(to_db_time(&shift.ends_at))
                .bind(shift.status.as_str())
                .bind(shift.clock_in_at.as_ref().map(to_db_time))
                .bind(shift.clock_out_at.as_ref().map(to_db_time))
                .bind(&shift.notes_enc)
                .bind(to_db_time(&shift.created_at))
                .execute(&mut *conn)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    /// Soft-delete future, pending, unannotated instances in `scope`.
    ///
    /// Completed, skipped or annotated rows are never touched, and neither
    /// are ad-hoc rows. Returns the number of rows marked deleted.
    pub async fn soft_delete_future_pending(
        conn: &mut SqliteConnection,
        scope: SoftDeleteScope<'_>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let (task_filter, log_filter, shift_filter, id) = match scope {
            SoftDeleteScope::TaskTemplate(id) => (Some("template_id = ?"), None, None, id),
            SoftDeleteScope::MedicationSchedule(id) => (None, Some("schedule_id = ?"), None, id),
            SoftDeleteScope::Medication(id) => (
                None,
                Some("medication_id = ? AND schedule_id IS NOT NULL"),
                None,
                id,
            ),
            SoftDeleteScope::ShiftTemplate(id) => (None, None, Some("template_id = ?"), id),
            SoftDeleteScope::Recipient(id) => (
                Some("recipient_id = ? AND template_id IS NOT NULL"),
                Some("recipient_id = ? AND schedule_id IS NOT NULL"),
                Some("recipient_id = ? AND template_id IS NOT NULL"),
                id,
            ),
        };

        let stamp = to_db_time(&now);
        let mut deleted = 0;

        if let Some(filter) = task_filter {
            let sql = format!(
                "UPDATE tasks SET deleted_at = ? WHERE {} AND status = 'pending' \
                 AND notes_enc IS NULL AND deleted_at IS NULL AND scheduled_at > ?",
                filter
            );
            deleted += sqlx::query(&sql)
                .bind(&stamp)
                .bind(id)
                .bind(&stamp)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        }
        if let Some(filter) = log_filter {
            let sql = format!(
                "UPDATE medication_logs SET deleted_at = ? WHERE {} AND status = 'pending' \
                 AND notes_enc IS NULL AND deleted_at IS NULL AND scheduled_at > ?",
                filter
            );
            deleted += sqlx::query(&sql)
                .bind(&stamp)
                .bind(id)
                .bind(&stamp)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        }
        if let Some(filter) = shift_filter {
            let sql = format!(
                "UPDATE shifts SET deleted_at = ? WHERE {} AND status = 'scheduled' \
                 AND notes_enc IS NULL AND deleted_at IS NULL AND starts_at > ?",
                filter
            );
            deleted += sqlx::query(&sql)
                .bind(&stamp)
                .bind(id)
                .bind(&stamp)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        }

        Ok(deleted)
    }

    /// Get a live task by ID, scoped to its household
    pub async fn get_task(
        &self,
        household_id: &str,
        task_id: &str,
    ) -> Result<Option<TaskInstance>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
            TASK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(task_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(map_task).transpose()
    }

    /// Persist the caregiver-editable fields of a task that is still live and
    /// in `expected` status.
    ///
    /// Returns false when the row was soft-deleted or moved on since it was
    /// read; nothing is written in that case.
    pub async fn update_task(
        &self,
        task: &TaskInstance,
        expected: TaskStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, notes_enc = ?, completed_at = ?, completed_by = ?
            WHERE id = ? AND deleted_at IS NULL AND status = ?
            "#,
        )
        .bind(task.status.as_str())
        .bind(&task.notes_enc)
        .bind(task.completed_at.as_ref().map(to_db_time))
        .bind(&task.completed_by)
        .bind(&task.id)
        .bind(expected.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Live tasks of a recipient scheduled in `[from, to)`
    pub async fn list_tasks_between(
        &self,
        recipient_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE recipient_id = ? AND deleted_at IS NULL \
             AND scheduled_at >= ? AND scheduled_at < ? ORDER BY scheduled_at, id",
            TASK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id)
            .bind(to_db_time(&from))
            .bind(to_db_time(&to))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_task).collect()
    }

    /// Pending tasks whose instant fell in `(after, through]`, across households
    pub async fn list_tasks_newly_overdue(
        &self,
        after: DateTime<Utc>,
        through: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE status = 'pending' AND deleted_at IS NULL \
             AND scheduled_at > ? AND scheduled_at <= ? ORDER BY scheduled_at, id",
            TASK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_time(&after))
            .bind(to_db_time(&through))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_task).collect()
    }

    pub async fn get_administration(
        &self,
        household_id: &str,
        administration_id: &str,
    ) -> Result<Option<MedicationAdministration>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medication_logs WHERE id = ? AND household_id = ? \
             AND deleted_at IS NULL",
            ADMINISTRATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(administration_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(map_administration).transpose()
    }

    /// Same contract as `update_task`, for administrations
    pub async fn update_administration(
        &self,
        log: &MedicationAdministration,
        expected: AdministrationStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE medication_logs
            SET status = ?, notes_enc = ?, administered_at = ?, administered_by = ?
            WHERE id = ? AND deleted_at IS NULL AND status = ?
            "#,
        )
        .bind(log.status.as_str())
        .bind(&log.notes_enc)
        .bind(log.administered_at.as_ref().map(to_db_time))
        .bind(&log.administered_by)
        .bind(&log.id)
        .bind(expected.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list_administrations_between(
        &self,
        recipient_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MedicationAdministration>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medication_logs WHERE recipient_id = ? AND deleted_at IS NULL \
             AND scheduled_at >= ? AND scheduled_at < ? ORDER BY scheduled_at, id",
            ADMINISTRATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id)
            .bind(to_db_time(&from))
            .bind(to_db_time(&to))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_administration).collect()
    }

    pub async fn list_administrations_newly_overdue(
        &self,
        after: DateTime<Utc>,
        through: DateTime<Utc>,
    ) -> Result<Vec<MedicationAdministration>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medication_logs WHERE status = 'pending' AND deleted_at IS NULL \
             AND scheduled_at > ? AND scheduled_at <= ? ORDER BY scheduled_at, id",
            ADMINISTRATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_time(&after))
            .bind(to_db_time(&through))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_administration).collect()
    }

    /// Count live instances of each kind for a recipient: (tasks, administrations, shifts)
    pub async fn count_live(&self, recipient_id: &str) -> Result<(i64, i64, i64), sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tasks
                 WHERE recipient_id = ?1 AND deleted_at IS NULL) AS tasks,
                (SELECT COUNT(*) FROM medication_logs
                 WHERE recipient_id = ?1 AND deleted_at IS NULL) AS administrations,
                (SELECT COUNT(*) FROM shifts
                 WHERE recipient_id = ?1 AND deleted_at IS NULL) AS shifts
            "#,
        )
        .bind(recipient_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok((
            row.try_get("tasks")?,
            row.try_get("administrations")?,
            row.try_get("shifts")?,
        ))
    }
}

fn map_task(row: &SqliteRow) -> Result<TaskInstance, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(TaskInstance {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        template_id: row.try_get("template_id")?,
        title_enc: row.try_get("title_enc")?,
        description_enc: row.try_get("description_enc")?,
        category: row.try_get("category")?,
        assigned_to: row.try_get("assigned_to")?,
        scheduled_at: get_time(row, "scheduled_at")?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| decode_error(format!("unknown task status '{}'", status)))?,
        notes_enc: row.try_get("notes_enc")?,
        completed_at: get_opt_time(row, "completed_at")?,
        completed_by: row.try_get("completed_by")?,
        deleted_at: get_opt_time(row, "deleted_at")?,
        created_at: get_time(row, "created_at")?,
    })
}

fn map_administration(row: &SqliteRow) -> Result<MedicationAdministration, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(MedicationAdministration {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        medication_id: row.try_get("medication_id")?,
        schedule_id: row.try_get("schedule_id")?,
        dosage_enc: row.try_get("dosage_enc")?,
        scheduled_at: get_time(row, "scheduled_at")?,
        status: AdministrationStatus::parse(&status)
            .ok_or_else(|| decode_error(format!("unknown administration status '{}'", status)))?,
        notes_enc: row.try_get("notes_enc")?,
        administered_at: get_opt_time(row, "administered_at")?,
        administered_by: row.try_get("administered_by")?,
        deleted_at: get_opt_time(row, "deleted_at")?,
        created_at: get_time(row, "created_at")?,
    })
}

pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_utils::*;

    async fn completed_count(db: &DbConnection) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status = 'completed'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn test_update_misses_row_deleted_after_read() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = InstanceRepository::new(db.db.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let template = create_task_template(&db, &recipient, daily(&["08:00"])).await;
        let now = utc("2026-03-01T06:00:00Z");
        let task = pending_task(&recipient, Some(template.id.as_str()), utc("2026-03-01T08:00:00Z"));

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(InstanceRepository::insert_if_absent(&mut conn, &InstanceRow::Task(task.clone()))
            .await
            .unwrap());

        let mut read = repo.get_task(&household.id, &task.id).await.unwrap().unwrap();
        let removed = InstanceRepository::soft_delete_future_pending(
            &mut conn,
            SoftDeleteScope::TaskTemplate(&template.id),
            now,
        )
        .await
        .unwrap();
        assert_eq!(removed, 1);
        drop(conn);

        read.status = TaskStatus::Completed;
        read.completed_at = Some(now);
        read.completed_by = Some("caregiver-1".to_string());
        assert!(!repo.update_task(&read, TaskStatus::Pending).await.unwrap());
        assert_eq!(completed_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_second_outcome_from_same_read_is_rejected() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = InstanceRepository::new(db.db.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let task = pending_task(&recipient, None, utc("2026-03-01T08:00:00Z"));
        let mut conn = db.pool().acquire().await.unwrap();
        InstanceRepository::insert_if_absent(&mut conn, &InstanceRow::Task(task.clone()))
            .await
            .unwrap();
        drop(conn);

        let mut first = task.clone();
        first.status = TaskStatus::Completed;
        first.completed_by = Some("caregiver-1".to_string());
        let mut second = task.clone();
        second.status = TaskStatus::Completed;
        second.completed_by = Some("caregiver-2".to_string());

        assert!(repo.update_task(&first, TaskStatus::Pending).await.unwrap());
        assert!(!repo.update_task(&second, TaskStatus::Pending).await.unwrap());

        let stored = repo.get_task(&household.id, &task.id).await.unwrap().unwrap();
        assert_eq!(stored.completed_by.as_deref(), Some("caregiver-1"));
        assert_eq!(completed_count(&db).await, 1);
    }
}
