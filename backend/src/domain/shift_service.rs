use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::commands::shifts::{HandoffCommand, SwapResult};
use crate::domain::models::{generate_id, InstanceRow, Shift, ShiftHandoff, ShiftStatus};
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, InstanceRepository, ShiftRepository};

/// Caregiver-facing shift lifecycle: clock in, clock out, swaps and handoffs
#[derive(Clone)]
pub struct ShiftService {
    db: DbConnection,
    shift_repository: ShiftRepository,
}

impl ShiftService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            shift_repository: ShiftRepository::new(db.clone()),
            db,
        }
    }

    /// Get a live shift by ID, scoped to its household
    pub async fn get_shift(&self, household_id: &str, shift_id: &str) -> ScheduleResult<Shift> {
        self.shift_repository
            .get_shift(household_id, shift_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("shift", shift_id))
    }

    fn check_transition(shift: &Shift, next: ShiftStatus) -> ScheduleResult<()> {
        if shift.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ScheduleError::InvalidTransition {
                entity: "shift",
                from: shift.status.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Persist a transition, failing if the row moved since it was read.
    async fn apply(&self, shift: &Shift, expected: ShiftStatus) -> ScheduleResult<()> {
        let mut conn = self.db.pool().acquire().await?;
        if !ShiftRepository::update_if_status(&mut conn, shift, expected).await? {
            warn!(shift_id = %shift.id, "shift changed state concurrently");
            return Err(ScheduleError::InvalidTransition {
                entity: "shift",
                from: expected.as_str().to_string(),
                to: shift.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Start a scheduled shift
    pub async fn clock_in(
        &self,
        household_id: &str,
        shift_id: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<Shift> {
        let mut shift = self.get_shift(household_id, shift_id).await?;
        Self::check_transition(&shift, ShiftStatus::Active)?;

        let previous = shift.status;
        shift.status = ShiftStatus::Active;
        shift.clock_in_at = Some(now);
        self.apply(&shift, previous).await?;
        info!(household_id, shift_id, caregiver_id = %shift.caregiver_id, "clocked in");
        Ok(shift)
    }

    /// End an active shift
    pub async fn clock_out(
        &self,
        household_id: &str,
        shift_id: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<Shift> {
        let mut shift = self.get_shift(household_id, shift_id).await?;
        Self::check_transition(&shift, ShiftStatus::Completed)?;

        let previous = shift.status;
        shift.status = ShiftStatus::Completed;
        shift.clock_out_at = Some(now);
        self.apply(&shift, previous).await?;
        info!(household_id, shift_id, "clocked out");
        Ok(shift)
    }

    /// Hand a scheduled shift to another caregiver.
    ///
    /// The original is marked swapped and a one-off replacement with the same
    /// times is written in the same transaction.
    pub async fn accept_swap(
        &self,
        household_id: &str,
        shift_id: &str,
        new_caregiver_id: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<SwapResult> {
        if new_caregiver_id.is_empty() {
            return Err(ScheduleError::Validation("a caregiver is required".to_string()));
        }
        let mut original = self.get_shift(household_id, shift_id).await?;
        Self::check_transition(&original, ShiftStatus::Swapped)?;
        if original.caregiver_id == new_caregiver_id {
            return Err(ScheduleError::Validation(
                "a shift cannot be swapped to its own caregiver".to_string(),
            ));
        }

        let previous = original.status;
        original.status = ShiftStatus::Swapped;
        let replacement = Shift {
            id: generate_id(),
            template_id: None,
            caregiver_id: new_caregiver_id.to_string(),
            status: ShiftStatus::Scheduled,
            clock_in_at: None,
            clock_out_at: None,
            notes_enc: None,
            deleted_at: None,
            created_at: now,
            ..original.clone()
        };

        let mut tx = self.db.pool().begin().await?;
        if !ShiftRepository::update_if_status(&mut tx, &original, previous).await? {
            return Err(ScheduleError::InvalidTransition {
                entity: "shift",
                from: previous.as_str().to_string(),
                to: ShiftStatus::Swapped.as_str().to_string(),
            });
        }
        InstanceRepository::insert_if_absent(&mut tx, &InstanceRow::Shift(replacement.clone()))
            .await?;
        tx.commit().await?;

        info!(
            household_id,
            shift_id,
            replacement_id = %replacement.id,
            caregiver_id = new_caregiver_id,
            "accepted shift swap"
        );
        Ok(SwapResult {
            original,
            replacement,
        })
    }

    /// Leave handoff notes for the next caregiver. Only an active shift takes
    /// a handoff.
    pub async fn record_handoff(
        &self,
        household_id: &str,
        shift_id: &str,
        command: HandoffCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<ShiftHandoff> {
        if command.notes_enc.is_empty() {
            return Err(ScheduleError::Validation("handoff notes cannot be empty".to_string()));
        }
        let shift = self.get_shift(household_id, shift_id).await?;
        if shift.status != ShiftStatus::Active {
            return Err(ScheduleError::InvalidTransition {
                entity: "shift",
                from: shift.status.as_str().to_string(),
                to: "handoff".to_string(),
            });
        }

        let handoff = ShiftHandoff {
            id: generate_id(),
            shift_id: shift.id,
            household_id: household_id.to_string(),
            author_id: command.author_id,
            notes_enc: command.notes_enc,
            created_at: now,
        };
        self.shift_repository.store_handoff(&handoff).await?;
        info!(household_id, shift_id, "recorded shift handoff");
        Ok(handoff)
    }

    /// Handoff notes left on a shift, oldest first
    pub async fn list_handoffs(
        &self,
        household_id: &str,
        shift_id: &str,
    ) -> ScheduleResult<Vec<ShiftHandoff>> {
        let shift = self.get_shift(household_id, shift_id).await?;
        Ok(self.shift_repository.list_handoffs(&shift.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{GenerationEngine, TemplateSelector};
    use crate::domain::ports::GenerationGate;
    use crate::domain::test_utils::*;

    async fn first_shift(db: &DbConnection, now: DateTime<Utc>) -> (String, Shift) {
        let household = create_household(db).await;
        let recipient = create_recipient(db, &household.id, "UTC").await;
        create_shift_template(db, &recipient, daily(&["09:00"]), 480).await;
        GenerationEngine::new(db.clone(), GenerationGate::new())
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();
        let shifts = ShiftRepository::new(db.clone())
            .list_shifts_between(&recipient.id, now, utc("2026-03-05T00:00:00Z"))
            .await
            .unwrap();
        (household.id, shifts[0].clone())
    }

    #[tokio::test]
    async fn test_clock_in_and_out() {
        let db = DbConnection::init_test().await.unwrap();
        let service = ShiftService::new(db.db.clone());
        let (household_id, shift) = first_shift(&db, utc("2026-03-01T06:00:00Z")).await;

        let active = service
            .clock_in(&household_id, &shift.id, utc("2026-03-01T08:58:00Z"))
            .await
            .unwrap();
        assert_eq!(active.status, ShiftStatus::Active);

        let again = service
            .clock_in(&household_id, &shift.id, utc("2026-03-01T09:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(again, ScheduleError::InvalidTransition { .. }));

        let done = service
            .clock_out(&household_id, &shift.id, utc("2026-03-01T17:01:00Z"))
            .await
            .unwrap();
        assert_eq!(done.status, ShiftStatus::Completed);
        assert_eq!(done.clock_out_at, Some(utc("2026-03-01T17:01:00Z")));
    }

    #[tokio::test]
    async fn test_swap_creates_replacement() {
        let db = DbConnection::init_test().await.unwrap();
        let service = ShiftService::new(db.db.clone());
        let (household_id, shift) = first_shift(&db, utc("2026-03-01T06:00:00Z")).await;

        let result = service
            .accept_swap(&household_id, &shift.id, "caregiver-2", utc("2026-03-01T07:00:00Z"))
            .await
            .unwrap();

        assert_eq!(result.original.status, ShiftStatus::Swapped);
        assert_eq!(result.replacement.template_id, None);
        assert_eq!(result.replacement.caregiver_id, "caregiver-2");
        assert_eq!(result.replacement.starts_at, shift.starts_at);
        assert_eq!(result.replacement.ends_at, shift.ends_at);

        let stored = service.get_shift(&household_id, &shift.id).await.unwrap();
        assert_eq!(stored.status, ShiftStatus::Swapped);
        let err = service
            .clock_in(&household_id, &shift.id, utc("2026-03-01T09:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_handoff_requires_active_shift() {
        let db = DbConnection::init_test().await.unwrap();
        let service = ShiftService::new(db.db.clone());
        let (household_id, shift) = first_shift(&db, utc("2026-03-01T06:00:00Z")).await;
        let command = || HandoffCommand {
            author_id: "caregiver-1".to_string(),
            notes_enc: "enc:ate well".to_string(),
        };

        let err = service
            .record_handoff(&household_id, &shift.id, command(), utc("2026-03-01T08:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));

        service
            .clock_in(&household_id, &shift.id, utc("2026-03-01T09:00:00Z"))
            .await
            .unwrap();
        service
            .record_handoff(&household_id, &shift.id, command(), utc("2026-03-01T16:45:00Z"))
            .await
            .unwrap();
        let handoffs = service.list_handoffs(&household_id, &shift.id).await.unwrap();
        assert_eq!(handoffs.len(), 1);
    }
}
