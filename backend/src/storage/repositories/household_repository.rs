use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::models::{CareRecipient, Household};
use crate::storage::{get_time, to_db_time, DbConnection};

/// Repository for households and the care recipients they own
#[derive(Clone)]
pub struct HouseholdRepository {
    db: DbConnection,
}

impl HouseholdRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a household in the database
    pub async fn store_household(&self, household: &Household) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO households (id, name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&household.id)
        .bind(&household.name)
        .bind(to_db_time(&household.created_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_household(&self, household_id: &str) -> Result<Option<Household>, sqlx::Error> {
        let row = sqlx::query("SELECT id, name, created_at FROM households WHERE id = ?")
            .bind(household_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref()
            .map(|r| -> Result<Household, sqlx::Error> {
                Ok(Household {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    created_at: get_time(r, "created_at")?,
                })
            })
            .transpose()
    }

    /// List all household IDs, oldest first
    pub async fn list_household_ids(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM households ORDER BY created_at ASC, id ASC")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(|r| r.try_get("id")).collect()
    }

    /// Store a care recipient
    pub async fn store_recipient(&self, recipient: &CareRecipient) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO care_recipients
                (id, household_id, name_enc, timezone, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&recipient.id)
        .bind(&recipient.household_id)
        .bind(&recipient.name_enc)
        .bind(&recipient.timezone)
        .bind(recipient.is_active)
        .bind(to_db_time(&recipient.created_at))
        .bind(to_db_time(&recipient.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Get a recipient by ID, scoped to its household
    pub async fn get_recipient(
        &self,
        household_id: &str,
        recipient_id: &str,
    ) -> Result<Option<CareRecipient>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, household_id, name_enc, timezone, is_active, created_at, updated_at
            FROM care_recipients
            WHERE id = ? AND household_id = ?
            "#,
        )
        .bind(recipient_id)
        .bind(household_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(map_recipient).transpose()
    }

    /// Active recipients of a household
    pub async fn list_active_recipients(
        &self,
        household_id: &str,
    ) -> Result<Vec<CareRecipient>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, household_id, name_enc, timezone, is_active, created_at, updated_at
            FROM care_recipients
            WHERE household_id = ? AND is_active = TRUE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(household_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(map_recipient).collect()
    }

    /// Change a recipient's timezone inside the caller's transaction
    pub async fn update_timezone(
        conn: &mut SqliteConnection,
        recipient_id: &str,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE care_recipients SET timezone = ?, updated_at = ? WHERE id = ?")
            .bind(timezone)
            .bind(to_db_time(&now))
            .bind(recipient_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

fn map_recipient(row: &SqliteRow) -> Result<CareRecipient, sqlx::Error> {
    Ok(CareRecipient {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        name_enc: row.try_get("name_enc")?,
        timezone: row.try_get("timezone")?,
        is_active: row.try_get("is_active")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}
