//! Lifecycle of a draft loan application across both intake channels.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::affordability::AffordabilityEngine;
use super::compliance::{ComplianceValidator, ProposedTerms};
use super::domain::{
    AffordabilitySnapshot, ApplicationId, ApplicationStatus, Channel, ChannelSession, ConsumerId,
    LoanApplication,
};
use super::error::LendingError;
use super::repository::{Clock, LendingStore};
use super::steps::{self, StepInput, AFFORDABILITY_STEP, FINAL_STEP, TERM_PREVIEW_STEP};
use super::terms;

/// Drives the Draft → Pending transition and everything in between: step
/// accumulation, term preview, affordability sync, and the submission gate.
pub struct LoanApplicationService<S> {
    store: Arc<S>,
    affordability: Arc<AffordabilityEngine<S>>,
    clock: Arc<dyn Clock>,
}

impl<S> LoanApplicationService<S>
where
    S: LendingStore,
{
    pub fn new(
        store: Arc<S>,
        affordability: Arc<AffordabilityEngine<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            affordability,
            clock,
        }
    }

    /// Open a new draft at step 0 for the given channel.
    ///
    /// A consumer holds at most one active draft: any prior draft is
    /// auto-cancelled so the resume logic never has to disambiguate. For the
    /// conversational channel a session record is opened when a contact
    /// address is supplied, so the flow can be resumed from the same number.
    pub fn create_draft(
        &self,
        consumer: &ConsumerId,
        channel: Channel,
        contact_address: Option<&str>,
    ) -> Result<LoanApplication, LendingError> {
        let now = self.clock.now();

        if let Some(mut prior) = self.store.latest_draft(consumer)? {
            let expected = prior.version;
            prior.status = ApplicationStatus::Cancelled;
            prior.updated_at = now;
            self.store.update_application(prior.clone(), expected)?;
            info!(application = %prior.id.0, "auto-cancelled prior draft");
        }

        let application = LoanApplication::new(
            ApplicationId(Uuid::new_v4().to_string()),
            consumer.clone(),
            channel,
            now,
        );
        let stored = self.store.insert_application(application)?;

        if channel == Channel::Conversational {
            if let Some(address) = contact_address {
                self.store.upsert_session(ChannelSession {
                    consumer_id: consumer.clone(),
                    application_id: stored.id.clone(),
                    contact_address: address.to_string(),
                    active: true,
                    opened_at: now,
                    completed_at: None,
                })?;
            }
        }

        info!(application = %stored.id.0, channel = channel.label(), "draft created");
        Ok(stored)
    }

    /// Merge a step payload into an owned draft and run the step's triggers.
    ///
    /// At the term-preview step the loan terms are (re)derived once amount
    /// and term are both positive; at the affordability step the assessment
    /// is recomputed and its outcome recorded on the application.
    pub fn advance_step(
        &self,
        application_id: &ApplicationId,
        consumer: &ConsumerId,
        input: StepInput,
    ) -> Result<LoanApplication, LendingError> {
        let mut application = self.owned_application(application_id, consumer)?;
        if application.status != ApplicationStatus::Draft {
            return Err(LendingError::invalid_state(
                application.status.label(),
                "advance_step",
            ));
        }

        let expected = application.version;
        let step = input.number();
        steps::apply_step(&mut application, input);
        // The step counter only ever moves forward; revisiting an earlier
        // step to amend a field never regresses recorded progress.
        application.current_step = application.current_step.max(step);

        if step == TERM_PREVIEW_STEP && application.amount > 0.0 && application.term_months > 0 {
            application.terms = Some(terms::quote(application.amount, application.term_months));
        }

        if step == AFFORDABILITY_STEP {
            let assessment = self.affordability.compute_assessment(consumer)?;
            application.affordability = Some(AffordabilitySnapshot {
                status: assessment.status,
                max_loan_amount: assessment.max_loan_amount,
                assessed_at: assessment.computed_at,
            });
        }

        application.updated_at = self.clock.now();
        Ok(self.store.update_application(application, expected)?)
    }

    /// Submit a completed draft, transitioning it to Pending.
    ///
    /// Required fields and the accepted confirmation step are validated in
    /// aggregate, one message per problem, so a channel adapter can display
    /// everything at once. Proposed terms are then gated by the compliance
    /// validator before the transition.
    pub fn submit(
        &self,
        application_id: &ApplicationId,
        consumer: &ConsumerId,
    ) -> Result<LoanApplication, LendingError> {
        let mut application = self.owned_application(application_id, consumer)?;
        if application.status != ApplicationStatus::Draft {
            return Err(LendingError::invalid_state(
                application.status.label(),
                "submit",
            ));
        }

        let mut missing = Vec::new();
        if application.amount <= 0.0 {
            missing.push("loan amount is required".to_string());
        }
        if application.term_months == 0 {
            missing.push("loan term is required".to_string());
        }
        if application
            .purpose
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            missing.push("loan purpose is required".to_string());
        }
        if application.bank_name.is_none() {
            missing.push("bank name is required".to_string());
        }
        if application.account_number.is_none() {
            missing.push("account number is required".to_string());
        }
        if application.account_holder.is_none() {
            missing.push("account holder is required".to_string());
        }
        if !matches!(
            application.steps.get(&FINAL_STEP),
            Some(StepInput::Confirmation {
                accepted_terms: Some(true),
            })
        ) {
            missing.push("terms must be accepted at the confirmation step".to_string());
        }
        if !missing.is_empty() {
            return Err(LendingError::Validation(missing));
        }

        let expected = application.version;
        if application.terms.is_none() {
            application.terms = Some(terms::quote(application.amount, application.term_months));
        }

        self.gate_compliance(&application, consumer)?;

        let now = self.clock.now();
        application.status = ApplicationStatus::Pending;
        application.submitted_at = Some(now);
        application.updated_at = now;
        let stored = self.store.update_application(application, expected)?;

        if let Some(mut session) = self.store.session_for(consumer)? {
            if session.application_id == stored.id && session.active {
                session.active = false;
                session.completed_at = Some(now);
                self.store.upsert_session(session)?;
            }
        }

        info!(application = %stored.id.0, "application submitted");
        Ok(stored)
    }

    /// Locate the consumer's current draft and prepare it for the target
    /// channel. Returns `None` when no draft exists.
    pub fn resume(
        &self,
        consumer: &ConsumerId,
        target_channel: Channel,
        contact_address: Option<&str>,
    ) -> Result<Option<LoanApplication>, LendingError> {
        let Some(mut application) = self.store.latest_draft(consumer)? else {
            return Ok(None);
        };

        let now = self.clock.now();
        let expected = application.version;
        let stamped = application.stamp_channel(target_channel, now);

        if target_channel == Channel::Conversational {
            if let Some(address) = contact_address {
                let session = match self.store.session_for(consumer)? {
                    Some(mut session) if session.application_id == application.id => {
                        session.active = true;
                        session.contact_address = address.to_string();
                        session
                    }
                    _ => ChannelSession {
                        consumer_id: consumer.clone(),
                        application_id: application.id.clone(),
                        contact_address: address.to_string(),
                        active: true,
                        opened_at: now,
                        completed_at: None,
                    },
                };
                self.store.upsert_session(session)?;
            }
        }

        let application = if stamped {
            application.updated_at = now;
            self.store.update_application(application, expected)?
        } else {
            application
        };

        Ok(Some(application))
    }

    /// Recompute the consumer-scoped assessment so both channels observe the
    /// same figures on their next read. Safe to call from either channel.
    pub fn sync_affordability(
        &self,
        consumer: &ConsumerId,
    ) -> Result<super::domain::AffordabilityAssessment, LendingError> {
        self.affordability.compute_assessment(consumer)
    }

    /// Cancel an owned draft. Submitted applications are closed elsewhere.
    pub fn cancel_draft(
        &self,
        application_id: &ApplicationId,
        consumer: &ConsumerId,
    ) -> Result<LoanApplication, LendingError> {
        let mut application = self.owned_application(application_id, consumer)?;
        if application.status != ApplicationStatus::Draft {
            return Err(LendingError::invalid_state(
                application.status.label(),
                "cancel_draft",
            ));
        }
        let expected = application.version;
        application.status = ApplicationStatus::Cancelled;
        application.updated_at = self.clock.now();
        Ok(self.store.update_application(application, expected)?)
    }

    /// Fetch an application, treating records owned by someone else as
    /// absent.
    pub fn get(
        &self,
        application_id: &ApplicationId,
        consumer: &ConsumerId,
    ) -> Result<LoanApplication, LendingError> {
        self.owned_application(application_id, consumer)
    }

    fn owned_application(
        &self,
        application_id: &ApplicationId,
        consumer: &ConsumerId,
    ) -> Result<LoanApplication, LendingError> {
        match self.store.application(application_id)? {
            Some(application) if application.consumer_id == *consumer => Ok(application),
            _ => Err(LendingError::NotFound),
        }
    }

    fn gate_compliance(
        &self,
        application: &LoanApplication,
        consumer: &ConsumerId,
    ) -> Result<(), LendingError> {
        let config = self.store.regulatory_config()?;
        let assessment = match self.store.assessment(consumer)? {
            Some(assessment) if assessment.expires_at > self.clock.now() => assessment,
            _ => self.affordability.compute_assessment(consumer)?,
        };
        let terms = application
            .terms
            .clone()
            .unwrap_or_else(|| terms::quote(application.amount, application.term_months));

        let proposed = ProposedTerms {
            amount: application.amount,
            term_months: application.term_months,
            annual_interest_rate: terms.annual_interest_rate,
            initiation_fee: config.initiation_fee_ceiling(application.amount),
            monthly_service_fee: config.max_monthly_service_fee,
            monthly_installment: terms.monthly_payment,
            gross_monthly_income: assessment.gross_monthly_income,
            total_monthly_expenses: assessment.total_monthly_expenses,
        };

        let result = ComplianceValidator::check_all(&config, &proposed);
        if !result.compliant {
            warn!(
                application = %application.id.0,
                code = ?result.code,
                "submission blocked by compliance"
            );
            return Err(LendingError::ComplianceFailed {
                message: result.message,
            });
        }
        Ok(())
    }
}
