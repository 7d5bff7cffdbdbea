use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::models::ShiftTemplate;
use crate::error::ScheduleResult;
use crate::storage::{decode_rule, encode_rule, get_time, to_db_time, DbConnection};

const TEMPLATE_COLUMNS: &str = "id, household_id, recipient_id, caregiver_id, title_enc, \
     frequency, times_of_day, days_of_week, day_of_month, duration_minutes, is_active, \
     created_at, updated_at";

/// Repository for recurring shift definitions
#[derive(Clone)]
pub struct ShiftTemplateRepository {
    db: DbConnection,
}

impl ShiftTemplateRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn store_template(&self, template: &ShiftTemplate) -> ScheduleResult<()> {
        let rule = encode_rule(&template.rule)?;
        sqlx::query(
            r#"
            INSERT INTO shift_templates
                (id, household_id, recipient_id, caregiver_id, title_enc, frequency,
                 times_of_day, days_of_week, day_of_month, duration_minutes, is_active,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.household_id)
        .bind(&template.recipient_id)
        .bind(&template.caregiver_id)
        .bind(&template.title_enc)
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(i64::from(template.duration_minutes))
        .bind(template.is_active)
        .bind(to_db_time(&template.created_at))
        .bind(to_db_time(&template.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_template(
        &self,
        household_id: &str,
        template_id: &str,
    ) -> ScheduleResult<Option<ShiftTemplate>> {
        let sql = format!(
            "SELECT {} FROM shift_templates WHERE id = ? AND household_id = ?",
            TEMPLATE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(template_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(map_template).transpose()?)
    }

    pub async fn update_template(
        conn: &mut SqliteConnection,
        template: &ShiftTemplate,
    ) -> ScheduleResult<()> {
        let rule = encode_rule(&template.rule)?;
        sqlx::query(
            r#"
            UPDATE shift_templates
            SET caregiver_id = ?, title_enc = ?, frequency = ?, times_of_day = ?,
                days_of_week = ?, day_of_month = ?, duration_minutes = ?, is_active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&template.caregiver_id)
        .bind(&template.title_enc)
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(i64::from(template.duration_minutes))
        .bind(template.is_active)
        .bind(to_db_time(&template.updated_at))
        .bind(&template.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn list_active_for_recipient(
        conn: &mut SqliteConnection,
        recipient_id: &str,
    ) -> Result<Vec<ShiftTemplate>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM shift_templates WHERE recipient_id = ? AND is_active = TRUE ORDER BY id",
            TEMPLATE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(map_template).collect()
    }
}

fn map_template(row: &SqliteRow) -> Result<ShiftTemplate, sqlx::Error> {
    let duration: i64 = row.try_get("duration_minutes")?;
    Ok(ShiftTemplate {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        caregiver_id: row.try_get("caregiver_id")?,
        title_enc: row.try_get("title_enc")?,
        rule: decode_rule(row)?,
        duration_minutes: u32::try_from(duration).unwrap_or(0),
        is_active: row.try_get("is_active")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}
