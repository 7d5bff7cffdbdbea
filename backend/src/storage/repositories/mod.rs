pub mod config_repository;
pub mod household_repository;
pub mod housekeeping_repository;
pub mod instance_repository;
pub mod medication_repository;
pub mod notification_repository;
pub mod shift_repository;
pub mod shift_template_repository;
pub mod task_template_repository;
pub mod worker_run_repository;

pub use config_repository::ConfigRepository;
pub use household_repository::HouseholdRepository;
pub use housekeeping_repository::{HousekeepingRepository, PruneCounts};
pub use instance_repository::{InstanceRepository, SoftDeleteScope};
pub use medication_repository::MedicationRepository;
pub use notification_repository::NotificationRepository;
pub use shift_repository::ShiftRepository;
pub use shift_template_repository::ShiftTemplateRepository;
pub use task_template_repository::TaskTemplateRepository;
pub use worker_run_repository::{WorkerRun, WorkerRunRepository};
