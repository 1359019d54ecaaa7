//! Loan application lifecycle, affordability assessment, regulatory
//! compliance, and contract signing.
//!
//! Two intake channels (web forms and a conversational flow) drive the same
//! aggregates through the services in this module, so a consumer can start
//! on one surface and finish on the other without divergence.

pub mod affordability;
pub mod application;
pub mod compliance;
pub mod domain;
mod error;
pub mod memory;
pub mod repository;
pub mod router;
pub mod signing;
pub mod steps;
pub mod terms;

#[cfg(test)]
mod tests;

pub use affordability::{classify_preview, AffordabilityEngine, ASSESSMENT_VALIDITY_DAYS};
pub use application::LoanApplicationService;
pub use compliance::{
    ComplianceCode, ComplianceResult, ComplianceValidator, ProposedTerms, RegulatoryConfig,
};
pub use domain::{
    AffordabilityAssessment, AffordabilitySnapshot, AffordabilityStatus, ApplicationId,
    ApplicationStatus, ApplicationView, Channel, ChannelSession, ConsumerId, Contract, ContractId,
    ContractStatus, Expense, Frequency, Income, LoanApplication, SigningCredential,
};
pub use error::LendingError;
pub use memory::{MemoryStore, TracingMessenger};
pub use repository::{
    Clock, DeliveryError, LendingStore, MessageSender, RepositoryError, SystemClock,
};
pub use router::{lending_router, LendingState};
pub use signing::{
    IssuedCredential, SigningReceipt, SigningWorkflow, CODE_TTL_MINUTES, MAX_ATTEMPTS,
};
pub use steps::{StepInput, AFFORDABILITY_STEP, FINAL_STEP, TERM_PREVIEW_STEP};
pub use terms::{quote, LoanTerms};
