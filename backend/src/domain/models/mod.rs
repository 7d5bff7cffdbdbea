//! Domain models for households, recipients, recurring templates and the
//! instances materialized from them.

pub mod instance;
pub mod notification;
pub mod recipient;
pub mod template;

pub use instance::*;
pub use notification::*;
pub use recipient::*;
pub use template::*;

/// Fresh record identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
