//! Contract signing with a short-lived one-time credential.
//!
//! A contract moves Draft → Sent when the first code is issued, and Sent →
//! Signed when a code verifies. Expiry is evaluated lazily on access; there
//! is no background sweep. Message delivery is fire-and-forget: a failed
//! send is logged and the operation still succeeds, because the side effect
//! this workflow owns (the persisted credential) already completed.

mod credential;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApplicationStatus, ConsumerId, Contract, ContractId, ContractStatus, SigningCredential,
};
use super::error::LendingError;
use super::repository::{Clock, LendingStore, MessageSender};

/// Minutes a one-time code stays valid.
pub const CODE_TTL_MINUTES: i64 = 10;
/// Failed verifications allowed before a new code must be requested.
pub const MAX_ATTEMPTS: u8 = 3;

/// Outcome of issuing a signing code. `code` is populated only when the
/// workflow was built in development/test mode; production callers receive
/// the code exclusively through the messaging channel.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub contract_id: ContractId,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Receipt returned once a contract is signed.
#[derive(Debug, Clone, Serialize)]
pub struct SigningReceipt {
    pub contract_id: ContractId,
    pub application_id: super::domain::ApplicationId,
    pub signed_at: DateTime<Utc>,
}

pub struct SigningWorkflow<S, M> {
    store: Arc<S>,
    messenger: Arc<M>,
    clock: Arc<dyn Clock>,
    reveal_codes: bool,
}

impl<S, M> SigningWorkflow<S, M>
where
    S: LendingStore,
    M: MessageSender,
{
    pub fn new(store: Arc<S>, messenger: Arc<M>, clock: Arc<dyn Clock>, reveal_codes: bool) -> Self {
        Self {
            store,
            messenger,
            clock,
            reveal_codes,
        }
    }

    /// Issue a fresh one-time code for an owned, still-signable contract.
    ///
    /// Replaces any previous credential and resets the attempt counter. The
    /// raw code is sent to `destination` out-of-band; only its salted hash
    /// is persisted.
    pub fn issue_credential(
        &self,
        contract_id: &ContractId,
        consumer: &ConsumerId,
        destination: &str,
    ) -> Result<IssuedCredential, LendingError> {
        let mut contract = self.owned_contract(contract_id, consumer)?;
        let now = self.clock.now();

        match contract.status {
            ContractStatus::Signed => return Err(LendingError::AlreadySigned),
            ContractStatus::Cancelled | ContractStatus::Expired => {
                return Err(LendingError::invalid_state(
                    contract.status.label(),
                    "issue_credential",
                ));
            }
            ContractStatus::Draft | ContractStatus::Sent => {}
        }

        if contract.expires_at <= now {
            // Stale record: persist the lazy transition before rejecting.
            contract.status = ContractStatus::Expired;
            self.store.upsert_contract(contract)?;
            return Err(LendingError::invalid_state("expired", "issue_credential"));
        }

        if contract.status == ContractStatus::Draft {
            contract.status = ContractStatus::Sent;
            contract.sent_at = Some(now);
        }

        let code = credential::generate_code();
        let salt = credential::generate_salt();
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);

        self.store.upsert_credential(SigningCredential {
            contract_id: contract_id.clone(),
            code_hash: credential::hash_code(&salt, &code),
            salt,
            destination: destination.to_string(),
            issued_at: now,
            expires_at,
            attempts: 0,
            valid: false,
            signer: None,
            ip_address: None,
            user_agent: None,
            signed_at: None,
        })?;
        self.store.upsert_contract(contract)?;

        if let Err(err) = self.messenger.send_text(
            destination,
            &format!("Your contract signing code is {code}. It expires in {CODE_TTL_MINUTES} minutes."),
        ) {
            // The credential is already persisted and stays valid; the
            // consumer can request a resend.
            warn!(contract = %contract_id.0, error = %err, "signing code delivery failed");
        }

        info!(contract = %contract_id.0, "signing code issued");
        Ok(IssuedCredential {
            contract_id: contract_id.clone(),
            expires_at,
            code: self.reveal_codes.then_some(code),
        })
    }

    /// Verify a supplied code against the stored credential and, on match,
    /// flip the contract to Signed and the application to Disbursed.
    pub fn verify_credential(
        &self,
        contract_id: &ContractId,
        consumer: &ConsumerId,
        supplied_code: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SigningReceipt, LendingError> {
        let mut contract = self.owned_contract(contract_id, consumer)?;
        let now = self.clock.now();

        if contract.status == ContractStatus::Signed {
            return Err(LendingError::AlreadySigned);
        }

        let mut credential = self
            .store
            .credential_for(contract_id)?
            .ok_or(LendingError::CredentialMissing)?;

        if credential.valid {
            return Err(LendingError::AlreadySigned);
        }
        if now > credential.expires_at {
            return Err(LendingError::CredentialExpired);
        }
        if credential.attempts >= MAX_ATTEMPTS {
            return Err(LendingError::AttemptsExceeded);
        }

        if credential::hash_code(&credential.salt, supplied_code) != credential.code_hash {
            credential.attempts += 1;
            let remaining = MAX_ATTEMPTS - credential.attempts;
            self.store.upsert_credential(credential)?;
            return Err(LendingError::CodeMismatch { remaining });
        }

        let destination = credential.destination.clone();
        credential.valid = true;
        credential.signed_at = Some(now);
        credential.signer = Some(consumer.0.clone());
        credential.ip_address = ip_address.map(str::to_string);
        credential.user_agent = user_agent.map(str::to_string);
        self.store.upsert_credential(credential)?;

        contract.status = ContractStatus::Signed;
        contract.signed_at = Some(now);
        let application_id = contract.application_id.clone();
        self.store.upsert_contract(contract)?;

        if let Some(mut application) = self.store.application(&application_id)? {
            let expected = application.version;
            application.status = ApplicationStatus::Disbursed;
            application.updated_at = now;
            self.store.update_application(application, expected)?;
        }

        if let Err(err) = self.messenger.send_template(
            &destination,
            "contract_signed",
            &[contract_id.0.clone()],
        ) {
            warn!(contract = %contract_id.0, error = %err, "signing confirmation delivery failed");
        }

        info!(contract = %contract_id.0, "contract signed");
        Ok(SigningReceipt {
            contract_id: contract_id.clone(),
            application_id,
            signed_at: now,
        })
    }

    fn owned_contract(
        &self,
        contract_id: &ContractId,
        consumer: &ConsumerId,
    ) -> Result<Contract, LendingError> {
        match self.store.contract(contract_id)? {
            Some(contract) if contract.consumer_id == *consumer => Ok(contract),
            _ => Err(LendingError::NotFound),
        }
    }
}
