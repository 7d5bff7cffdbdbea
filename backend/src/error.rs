//! Error taxonomy for the scheduling backend.

use thiserror::Error;

/// Errors raised by domain services.
///
/// Uniqueness conflicts on instance inserts are deliberately absent: they are
/// the skip signal of idempotent generation and never leave the storage layer.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid time of day: {0}")]
    InvalidTimeOfDay(String),
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    /// Generic failure surfaced to mutation callers when reconciliation fails.
    #[error("unable to update schedule")]
    ScheduleUpdate(#[source] Box<ScheduleError>),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ScheduleError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ScheduleError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wrap a failure that happened after the caller's mutation committed.
    pub fn schedule_update(source: ScheduleError) -> Self {
        ScheduleError::ScheduleUpdate(Box::new(source))
    }

    /// Configuration errors fail one recipient's generation, not the run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScheduleError::InvalidTimezone(_) | ScheduleError::InvalidTimeOfDay(_)
        )
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
