//! In-memory reference implementations of the storage and messaging
//! contracts, used by the service binary and the test suites.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::compliance::RegulatoryConfig;
use super::domain::{
    AffordabilityAssessment, ApplicationId, ApplicationStatus, ChannelSession, ConsumerId,
    Contract, ContractId, Expense, Income, LoanApplication, SigningCredential,
};
use super::repository::{DeliveryError, LendingStore, MessageSender, RepositoryError};

#[derive(Default)]
pub struct MemoryStore {
    applications: Mutex<HashMap<ApplicationId, LoanApplication>>,
    incomes: Mutex<Vec<Income>>,
    expenses: Mutex<Vec<Expense>>,
    assessments: Mutex<HashMap<ConsumerId, AffordabilityAssessment>>,
    sessions: Mutex<HashMap<ConsumerId, ChannelSession>>,
    contracts: Mutex<HashMap<ContractId, Contract>>,
    credentials: Mutex<HashMap<ContractId, SigningCredential>>,
    config: Mutex<Option<RegulatoryConfig>>,
}

impl MemoryStore {
    /// Seed helpers for the binary's demo mode and for tests.
    pub fn add_income(&self, income: Income) {
        lock(&self.incomes).push(income);
    }

    pub fn add_expense(&self, expense: Expense) {
        lock(&self.expenses).push(expense);
    }

    pub fn seed_contract(&self, contract: Contract) {
        lock(&self.contracts).insert(contract.id.clone(), contract);
    }

    pub fn seed_application(&self, application: LoanApplication) {
        lock(&self.applications).insert(application.id.clone(), application);
    }
}

impl LendingStore for MemoryStore {
    fn insert_application(
        &self,
        application: LoanApplication,
    ) -> Result<LoanApplication, RepositoryError> {
        let mut guard = lock(&self.applications);
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update_application(
        &self,
        mut application: LoanApplication,
        expected_version: u64,
    ) -> Result<LoanApplication, RepositoryError> {
        let mut guard = lock(&self.applications);
        let current = guard
            .get(&application.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        application.version = expected_version + 1;
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<LoanApplication>, RepositoryError> {
        let guard = lock(&self.applications);
        Ok(guard.get(id).cloned())
    }

    fn latest_draft(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        let guard = lock(&self.applications);
        Ok(guard
            .values()
            .filter(|application| {
                application.consumer_id == *consumer
                    && application.status == ApplicationStatus::Draft
            })
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.0.cmp(&b.id.0))
            })
            .cloned())
    }

    fn incomes(&self, consumer: &ConsumerId) -> Result<Vec<Income>, RepositoryError> {
        let guard = lock(&self.incomes);
        Ok(guard
            .iter()
            .filter(|income| income.consumer_id == *consumer)
            .cloned()
            .collect())
    }

    fn expenses(&self, consumer: &ConsumerId) -> Result<Vec<Expense>, RepositoryError> {
        let guard = lock(&self.expenses);
        Ok(guard
            .iter()
            .filter(|expense| expense.consumer_id == *consumer)
            .cloned()
            .collect())
    }

    fn upsert_assessment(
        &self,
        assessment: AffordabilityAssessment,
    ) -> Result<(), RepositoryError> {
        lock(&self.assessments).insert(assessment.consumer_id.clone(), assessment);
        Ok(())
    }

    fn assessment(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<AffordabilityAssessment>, RepositoryError> {
        let guard = lock(&self.assessments);
        Ok(guard.get(consumer).cloned())
    }

    fn session_for(
        &self,
        consumer: &ConsumerId,
    ) -> Result<Option<ChannelSession>, RepositoryError> {
        let guard = lock(&self.sessions);
        Ok(guard.get(consumer).cloned())
    }

    fn upsert_session(&self, session: ChannelSession) -> Result<(), RepositoryError> {
        lock(&self.sessions).insert(session.consumer_id.clone(), session);
        Ok(())
    }

    fn contract(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError> {
        let guard = lock(&self.contracts);
        Ok(guard.get(id).cloned())
    }

    fn upsert_contract(&self, contract: Contract) -> Result<(), RepositoryError> {
        lock(&self.contracts).insert(contract.id.clone(), contract);
        Ok(())
    }

    fn credential_for(
        &self,
        contract: &ContractId,
    ) -> Result<Option<SigningCredential>, RepositoryError> {
        let guard = lock(&self.credentials);
        Ok(guard.get(contract).cloned())
    }

    fn upsert_credential(&self, credential: SigningCredential) -> Result<(), RepositoryError> {
        lock(&self.credentials).insert(credential.contract_id.clone(), credential);
        Ok(())
    }

    fn regulatory_config(&self) -> Result<RegulatoryConfig, RepositoryError> {
        let mut guard = lock(&self.config);
        Ok(guard.get_or_insert_with(RegulatoryConfig::default).clone())
    }

    fn update_regulatory_config(&self, config: RegulatoryConfig) -> Result<(), RepositoryError> {
        *lock(&self.config) = Some(config);
        Ok(())
    }
}

/// Acquire a mutex, recovering from poisoning. A poisoned lock only means
/// another caller panicked mid-operation; the data it guards is still
/// consistent because every write here is a single insert or replace.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Messenger that records sends in the log instead of dispatching them.
/// Stands in for the real provider until one is wired up.
#[derive(Default)]
pub struct TracingMessenger;

impl MessageSender for TracingMessenger {
    fn send_text(&self, destination: &str, body: &str) -> Result<(), DeliveryError> {
        info!(%destination, %body, "outbound text");
        Ok(())
    }

    fn send_template(
        &self,
        destination: &str,
        template: &str,
        params: &[String],
    ) -> Result<(), DeliveryError> {
        info!(%destination, %template, ?params, "outbound template");
        Ok(())
    }
}
