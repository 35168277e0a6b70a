//! Read-only views over the measurement logs.

pub mod analyze;
pub mod dashboard;
