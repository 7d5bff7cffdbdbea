use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::instance_repository::decode_error;
use crate::domain::models::{Shift, ShiftHandoff, ShiftStatus};
use crate::storage::{get_opt_time, get_time, to_db_time, DbConnection};

const SHIFT_COLUMNS: &str = "id, household_id, recipient_id, template_id, caregiver_id, \
     title_enc, starts_at, ends_at, status, clock_in_at, clock_out_at, notes_enc, deleted_at, \
     created_at";

/// Repository for shift instances and their handoff notes
#[derive(Clone)]
pub struct ShiftRepository {
    db: DbConnection,
}

impl ShiftRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn get_shift(
        &self,
        household_id: &str,
        shift_id: &str,
    ) -> Result<Option<Shift>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
            SHIFT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(shift_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(map_shift).transpose()
    }

    /// Write a shift's new status and clock times, provided it is still in
    /// `expected`. Returns false when another writer moved it first.
    pub async fn update_if_status(
        conn: &mut SqliteConnection,
        shift: &Shift,
        expected: ShiftStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET status = ?, clock_in_at = ?, clock_out_at = ?, notes_enc = ?
            WHERE id = ? AND status = ? AND deleted_at IS NULL
            "#,
        )
        .bind(shift.status.as_str())
        .bind(shift.clock_in_at.as_ref().map(to_db_time))
        .bind(shift.clock_out_at.as_ref().map(to_db_time))
        .bind(&shift.notes_enc)
        .bind(&shift.id)
        .bind(expected.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Live shifts of a recipient starting in `[from, to)`
    pub async fn list_shifts_between(
        &self,
        recipient_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Shift>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE recipient_id = ? AND deleted_at IS NULL \
             AND starts_at >= ? AND starts_at < ? ORDER BY starts_at, id",
            SHIFT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id)
            .bind(to_db_time(&from))
            .bind(to_db_time(&to))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_shift).collect()
    }

    /// Scheduled shifts of a household that started before `cutoff` with no clock-in
    pub async fn list_unstarted_before(
        &self,
        household_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Shift>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE household_id = ? AND status = 'scheduled' \
             AND clock_in_at IS NULL AND deleted_at IS NULL AND starts_at < ? \
             ORDER BY starts_at, id",
            SHIFT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(household_id)
            .bind(to_db_time(&cutoff))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_shift).collect()
    }

    /// Active shifts of a household ending in `[now, until]` that have no handoff yet
    pub async fn list_ending_without_handoff(
        &self,
        household_id: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Shift>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shifts s WHERE household_id = ? AND status = 'active' \
             AND deleted_at IS NULL AND ends_at >= ? AND ends_at <= ? \
             AND NOT EXISTS (SELECT 1 FROM shift_handoffs h WHERE h.shift_id = s.id) \
             ORDER BY ends_at, id",
            SHIFT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(household_id)
            .bind(to_db_time(&now))
            .bind(to_db_time(&until))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_shift).collect()
    }

    /// Active shifts, in any household, whose end time has passed
    pub async fn list_active_ended(&self, now: DateTime<Utc>) -> Result<Vec<Shift>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE status = 'active' AND deleted_at IS NULL \
             AND ends_at <= ? ORDER BY ends_at, id",
            SHIFT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_time(&now))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(map_shift).collect()
    }

    pub async fn store_handoff(&self, handoff: &ShiftHandoff) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO shift_handoffs (id, shift_id, household_id, author_id, notes_enc, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&handoff.id)
        .bind(&handoff.shift_id)
        .bind(&handoff.household_id)
        .bind(&handoff.author_id)
        .bind(&handoff.notes_enc)
        .bind(to_db_time(&handoff.created_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn list_handoffs(&self, shift_id: &str) -> Result<Vec<ShiftHandoff>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, shift_id, household_id, author_id, notes_enc, created_at
            FROM shift_handoffs
            WHERE shift_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(shift_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<ShiftHandoff, sqlx::Error> {
                Ok(ShiftHandoff {
                    id: row.try_get("id")?,
                    shift_id: row.try_get("shift_id")?,
                    household_id: row.try_get("household_id")?,
                    author_id: row.try_get("author_id")?,
                    notes_enc: row.try_get("notes_enc")?,
                    created_at: get_time(row, "created_at")?,
                })
            })
            .collect()
    }
}

fn map_shift(row: &SqliteRow) -> Result<Shift, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Shift {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        template_id: row.try_get("template_id")?,
        caregiver_id: row.try_get("caregiver_id")?,
        title_enc: row.try_get("title_enc")?,
        starts_at: get_time(row, "starts_at")?,
        ends_at: get_time(row, "ends_at")?,
        status: ShiftStatus::parse(&status)
            .ok_or_else(|| decode_error(format!("unknown shift status '{}'", status)))?,
        clock_in_at: get_opt_time(row, "clock_in_at")?,
        clock_out_at: get_opt_time(row, "clock_out_at")?,
        notes_enc: row.try_get("notes_enc")?,
        deleted_at: get_opt_time(row, "deleted_at")?,
        created_at: get_time(row, "created_at")?,
    })
}
