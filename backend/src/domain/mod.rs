//! # Domain Module
//!
//! Business logic for turning recurring care templates into concrete,
//! timestamped work.
//!
//! ## Module Organization
//!
//! - **recurrence / local_time**: which dates a rule fires on, and the UTC
//!   instant a local wall-clock time maps to on a given date
//! - **generation**: the idempotent materialization engine shared by tasks,
//!   medication administrations and shifts
//! - **reconciliation / cleanup / trigger**: keeping materialized instances in
//!   line with template edits, deactivations and timezone changes
//! - **\*_service**: template, recipient, care log and shift operations
//! - **status_checker / housekeeping**: the periodic passes run by the workers
//! - **ports**: notification, event fan-out and the generation suspend gate
//!
//! ## Rules
//!
//! - Content fields are ciphertext and are copied, never read
//! - Overdue is computed at read time and never stored
//! - Completed, skipped or annotated instances are never soft-deleted

pub mod care_log_service;
pub mod cleanup;
pub mod commands;
pub mod generation;
pub mod housekeeping;
pub mod local_time;
pub mod medication_service;
pub mod models;
pub mod ports;
pub mod recipient_service;
pub mod reconciliation;
pub mod recurrence;
pub mod schedule_view;
pub mod settings_service;
pub mod shift_service;
pub mod shift_template_service;
pub mod status_checker;
pub mod task_template_service;
pub mod trigger;

#[cfg(test)]
pub mod test_utils;

pub use care_log_service::CareLogService;
pub use cleanup::CleanupService;
pub use generation::{GenerationEngine, GenerationReport, TemplateSelector};
pub use housekeeping::HousekeepingService;
pub use medication_service::MedicationService;
pub use ports::{
    BroadcastPublisher, EventPublisher, GenerationGate, GenerationSuspended, Notifier,
    TracingNotifier,
};
pub use reconciliation::{ReconcileOutcome, Reconciler};
pub use recipient_service::RecipientService;
pub use schedule_view::{DaySchedule, ScheduleEntry, ScheduleViewService};
pub use settings_service::SettingsService;
pub use shift_service::ShiftService;
pub use shift_template_service::ShiftTemplateService;
pub use status_checker::{StatusChecker, StatusReport};
pub use task_template_service::TaskTemplateService;
pub use trigger::ScheduleTrigger;
