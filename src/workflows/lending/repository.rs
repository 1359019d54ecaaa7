use chrono::{DateTime, Utc};

use super::compliance::RegulatoryConfig;
use super::domain::{
    AffordabilityAssessment, ApplicationId, ChannelSession, ConsumerId, Contract, ContractId,
    Expense, Income, LoanApplication, SigningCredential,
};

/// Storage abstraction over the aggregates this engine owns.
///
/// Each method is a whole-record read or upsert; the only write guard is the
/// compare-and-swap on `LoanApplication::version`. The engine never requires
/// a transaction spanning aggregates.
pub trait LendingStore: Send + Sync {
    fn insert_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError>;

    /// Conditional write: succeeds only while the stored record still carries
    /// `expected_version`, then bumps the version. Stale writers get
    /// [`RepositoryError::Conflict`] and must re-read.
    fn update_application(
        &self,
        application: LoanApplication,
        expected_version: u64,
    ) -> Result<LoanApplication, RepositoryError>;

    fn application(&self, id: &ApplicationId) -> Result<Option<LoanApplication>, RepositoryError>;

    /// The consumer's most recently created draft, if any.
    fn latest_draft(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<LoanApplication>, RepositoryError>;

    fn incomes(&self, consumer: &ConsumerId) -> Result<Vec<Income>, RepositoryError>;
    fn expenses(&self, consumer: &ConsumerId) -> Result<Vec<Expense>, RepositoryError>;

    /// Full-replace upsert keyed by consumer; no assessment history is kept.
    fn upsert_assessment(
        &self,
        assessment: AffordabilityAssessment,
    ) -> Result<(), RepositoryError>;
    fn assessment(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<AffordabilityAssessment>, RepositoryError>;

    fn session_for(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<ChannelSession>, RepositoryError>;
    fn upsert_session(&self, session: ChannelSession) -> Result<(), RepositoryError>;

    fn contract(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError>;
    fn upsert_contract(&self, contract: Contract) -> Result<(), RepositoryError>;

    fn credential_for(
        &self,
        contract: &ContractId,
    ) -> Result<Option<SigningCredential>, RepositoryError>;
    fn upsert_credential(&self, credential: SigningCredential) -> Result<(), RepositoryError>;

    /// The singleton regulatory configuration, lazily created with the
    /// documented defaults when none has been stored yet.
    fn regulatory_config(&self) -> Result<RegulatoryConfig, RepositoryError>;
    fn update_regulatory_config(&self, config: RegulatoryConfig) -> Result<(), RepositoryError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound messaging capability. Fire-and-forget from this engine's point
/// of view: failures are logged by callers, never retried here.
pub trait MessageSender: Send + Sync {
    fn send_text(&self, destination: &str, body: &str) -> Result<(), DeliveryError>;
    fn send_template(
        &self,
        destination: &str,
        template: &str,
        params: &[String],
    ) -> Result<(), DeliveryError>;
}

/// Message dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("message transport unavailable: {0}")]
    Transport(String),
    #[error("destination rejected: {0}")]
    Rejected(String),
}

/// Time source so credential and assessment expiry can be tested without
/// sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, used by the service binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
