//! Loan origination service: multi-channel application intake, affordability
//! assessment, regulatory compliance checks, and contract signing.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
