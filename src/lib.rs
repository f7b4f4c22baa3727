//! Validation engine and HTTP surface for a three-step applicant registration wizard.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
