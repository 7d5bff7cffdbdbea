use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::models::{Medication, MedicationSchedule, ScheduledMedication};
use crate::error::ScheduleResult;
use crate::storage::{decode_rule, encode_rule, get_time, to_db_time, DbConnection};

const MEDICATION_COLUMNS: &str = "id, household_id, recipient_id, name_enc, dosage_enc, \
     instructions_enc, is_prn, is_active, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, medication_id, household_id, frequency, times_of_day, \
     days_of_week, day_of_month, is_active, created_at, updated_at";

/// Repository for medications and their dosing schedules
#[derive(Clone)]
pub struct MedicationRepository {
    db: DbConnection,
}

impl MedicationRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn store_medication(&self, medication: &Medication) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO medications
                (id, household_id, recipient_id, name_enc, dosage_enc, instructions_enc,
                 is_prn, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&medication.id)
        .bind(&medication.household_id)
        .bind(&medication.recipient_id)
        .bind(&medication.name_enc)
        .bind(&medication.dosage_enc)
        .bind(&medication.instructions_enc)
        .bind(medication.is_prn)
        .bind(medication.is_active)
        .bind(to_db_time(&medication.created_at))
        .bind(to_db_time(&medication.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_medication(
        &self,
        household_id: &str,
        medication_id: &str,
    ) -> Result<Option<Medication>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medications WHERE id = ? AND household_id = ?",
            MEDICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(medication_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(map_medication).transpose()
    }

    /// Overwrite a medication's content and flags
    pub async fn update_medication(
        conn: &mut SqliteConnection,
        medication: &Medication,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE medications
            SET name_enc = ?, dosage_enc = ?, instructions_enc = ?, is_prn = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&medication.name_enc)
        .bind(&medication.dosage_enc)
        .bind(&medication.instructions_enc)
        .bind(medication.is_prn)
        .bind(medication.is_active)
        .bind(to_db_time(&medication.updated_at))
        .bind(&medication.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn store_schedule(
        conn: &mut SqliteConnection,
        schedule: &MedicationSchedule,
    ) -> ScheduleResult<()> {
        let rule = encode_rule(&schedule.rule)?;
        sqlx::query(
            r#"
            INSERT INTO medication_schedules
                (id, medication_id, household_id, frequency, times_of_day, days_of_week,
                 day_of_month, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(&schedule.medication_id)
        .bind(&schedule.household_id)
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(schedule.is_active)
        .bind(to_db_time(&schedule.created_at))
        .bind(to_db_time(&schedule.updated_at))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_schedule(
        &self,
        household_id: &str,
        schedule_id: &str,
    ) -> Result<Option<MedicationSchedule>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medication_schedules WHERE id = ? AND household_id = ?",
            SCHEDULE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(schedule_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(map_schedule).transpose()
    }

    pub async fn update_schedule(
        conn: &mut SqliteConnection,
        schedule: &MedicationSchedule,
    ) -> ScheduleResult<()> {
        let rule = encode_rule(&schedule.rule)?;
        sqlx::query(
            r#"
            UPDATE medication_schedules
            SET frequency = ?, times_of_day = ?, days_of_week = ?, day_of_month = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(schedule.is_active)
        .bind(to_db_time(&schedule.updated_at))
        .bind(&schedule.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Deactivate every schedule of a medication
    pub async fn deactivate_schedules(
        conn: &mut SqliteConnection,
        medication_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE medication_schedules
            SET is_active = FALSE, updated_at = ?
            WHERE medication_id = ? AND is_active = TRUE
            "#,
        )
        .bind(to_db_time(&now))
        .bind(medication_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Active schedules of active medications for a recipient, each paired
    /// with its medication. PRN medications are included; callers filter.
    pub async fn list_scheduled_for_recipient(
        conn: &mut SqliteConnection,
        recipient_id: &str,
    ) -> Result<Vec<ScheduledMedication>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT m.id AS m_id, m.household_id AS m_household_id, m.recipient_id,
                   m.name_enc, m.dosage_enc, m.instructions_enc, m.is_prn,
                   m.is_active AS m_is_active, m.created_at AS m_created_at,
                   m.updated_at AS m_updated_at,
                   s.id, s.medication_id, s.household_id, s.frequency, s.times_of_day,
                   s.days_of_week, s.day_of_month, s.is_active, s.created_at, s.updated_at
            FROM medication_schedules s
            JOIN medications m ON m.id = s.medication_id
            WHERE m.recipient_id = ? AND m.is_active = TRUE AND s.is_active = TRUE
            ORDER BY m.id, s.id
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<ScheduledMedication, sqlx::Error> {
                let medication = Medication {
                    id: row.try_get("m_id")?,
                    household_id: row.try_get("m_household_id")?,
                    recipient_id: row.try_get("recipient_id")?,
                    name_enc: row.try_get("name_enc")?,
                    dosage_enc: row.try_get("dosage_enc")?,
                    instructions_enc: row.try_get("instructions_enc")?,
                    is_prn: row.try_get("is_prn")?,
                    is_active: row.try_get("m_is_active")?,
                    created_at: get_time(row, "m_created_at")?,
                    updated_at: get_time(row, "m_updated_at")?,
                };
                Ok(ScheduledMedication {
                    medication,
                    schedule: map_schedule(row)?,
                })
            })
            .collect()
    }
}

fn map_medication(row: &SqliteRow) -> Result<Medication, sqlx::Error> {
    Ok(Medication {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        name_enc: row.try_get("name_enc")?,
        dosage_enc: row.try_get("dosage_enc")?,
        instructions_enc: row.try_get("instructions_enc")?,
        is_prn: row.try_get("is_prn")?,
        is_active: row.try_get("is_active")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn map_schedule(row: &SqliteRow) -> Result<MedicationSchedule, sqlx::Error> {
    Ok(MedicationSchedule {
        id: row.try_get("id")?,
        medication_id: row.try_get("medication_id")?,
        household_id: row.try_get("household_id")?,
        rule: decode_rule(row)?,
        is_active: row.try_get("is_active")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}
