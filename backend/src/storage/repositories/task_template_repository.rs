use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::models::TaskTemplate;
use crate::error::ScheduleResult;
use crate::storage::{decode_rule, encode_rule, get_time, to_db_time, DbConnection};

const TEMPLATE_COLUMNS: &str = "id, household_id, recipient_id, title_enc, description_enc, \
     category, assigned_to, frequency, times_of_day, days_of_week, day_of_month, is_active, \
     created_at, updated_at";

/// Repository for task templates
#[derive(Clone)]
pub struct TaskTemplateRepository {
    db: DbConnection,
}

impl TaskTemplateRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a new task template
    pub async fn store_template(&self, template: &TaskTemplate) -> ScheduleResult<()> {
        let rule = encode_rule(&template.rule)?;
        sqlx::query(
            r#"
            INSERT INTO task_templates
                (id, household_id, recipient_id, title_enc, description_enc, category,
                 assigned_to, frequency, times_of_day, days_of_week, day_of_month, is_active,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.household_id)
        .bind(&template.recipient_id)
        .bind(&template.title_enc)
        .bind(&template.description_enc)
        .bind(&template.category)
        .bind(&template.assigned_to)
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(template.is_active)
        .bind(to_db_time(&template.created_at))
        .bind(to_db_time(&template.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Get a template by ID, scoped to its household
    pub async fn get_template(
        &self,
        household_id: &str,
        template_id: &str,
    ) -> ScheduleResult<Option<TaskTemplate>> {
        let sql = format!(
            "SELECT {} FROM task_templates WHERE id = ? AND household_id = ?",
            TEMPLATE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(template_id)
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(map_template).transpose()?)
    }

    /// Overwrite a template's content, rule and active flag
    pub async fn update_template(
        conn: &mut SqliteConnection,
        template: &TaskTemplate,
    ) -> ScheduleResult<()> {
        let rule = encode_rule(&template.rule)?;
        sqlx::query(
            r#"
            UPDATE task_templates
            SET title_enc = ?, description_enc = ?, category = ?, assigned_to = ?,
                frequency = ?, times_of_day = ?, days_of_week = ?, day_of_month = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&template.title_enc)
        .bind(&template.description_enc)
        .bind(&template.category)
        .bind(&template.assigned_to)
        .bind(&rule.frequency)
        .bind(&rule.times_of_day)
        .bind(&rule.days_of_week)
        .bind(rule.day_of_month)
        .bind(template.is_active)
        .bind(to_db_time(&template.updated_at))
        .bind(&template.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Active templates for a recipient, read inside the generation transaction
    pub async fn list_active_for_recipient(
        conn: &mut SqliteConnection,
        recipient_id: &str,
    ) -> Result<Vec<TaskTemplate>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM task_templates WHERE recipient_id = ? AND is_active = TRUE ORDER BY id",
            TEMPLATE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(map_template).collect()
    }
}

fn map_template(row: &SqliteRow) -> Result<TaskTemplate, sqlx::Error> {
    Ok(TaskTemplate {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        recipient_id: row.try_get("recipient_id")?,
        title_enc: row.try_get("title_enc")?,
        description_enc: row.try_get("description_enc")?,
        category: row.try_get("category")?,
        assigned_to: row.try_get("assigned_to")?,
        rule: decode_rule(row)?,
        is_active: row.try_get("is_active")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}
