//! # I/O Module
//!
//! External interfaces of the scheduling backend.
//!
//! ## Layer Organization
//!
//! - **rest**: axum handlers under `/api` plus the `/health` probe
//! - **rest::mappers**: conversions between `shared` DTOs and domain models
//!
//! Handlers own no business rules. They map the request into a command, call
//! one service, and translate the [`ScheduleError`](crate::error::ScheduleError)
//! into a status code with a JSON `{"error": ...}` body.

pub mod rest;

pub use rest::*;
