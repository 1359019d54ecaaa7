use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::steps::StepInput;
use super::terms::LoanTerms;

/// Identifier wrapper for consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerId(pub String);

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for credit agreements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

/// Intake surface the consumer is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Conversational,
}

impl Channel {
    pub const fn label(self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Conversational => "conversational",
        }
    }
}

/// Lifecycle status of a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    UnderReview,
    Approved,
    Disbursed,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Disbursed => "disbursed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Disbursed | ApplicationStatus::Rejected | ApplicationStatus::Cancelled
        )
    }
}

/// Snapshot of the latest affordability outcome recorded on an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilitySnapshot {
    pub status: AffordabilityStatus,
    pub max_loan_amount: f64,
    pub assessed_at: DateTime<Utc>,
}

/// The central aggregate: one consumer's draft-through-disbursal journey.
///
/// Step input accumulates as typed per-step records; known fields are also
/// routed into the flat attributes below so downstream consumers never parse
/// step payloads. `version` is an optimistic-concurrency token: every write
/// is a compare-and-swap and stale writers receive a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub consumer_id: ConsumerId,
    pub status: ApplicationStatus,
    pub channel: Channel,
    pub current_step: u8,
    pub steps: BTreeMap<u8, StepInput>,
    pub amount: f64,
    pub term_months: u32,
    pub purpose: Option<String>,
    pub terms: Option<LoanTerms>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub affordability: Option<AffordabilitySnapshot>,
    pub web_started_at: Option<DateTime<Utc>>,
    pub conversational_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl LoanApplication {
    pub fn new(
        id: ApplicationId,
        consumer_id: ConsumerId,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Self {
        let mut application = Self {
            id,
            consumer_id,
            status: ApplicationStatus::Draft,
            channel,
            current_step: 0,
            steps: BTreeMap::new(),
            amount: 0.0,
            term_months: 0,
            purpose: None,
            terms: None,
            bank_name: None,
            account_number: None,
            account_holder: None,
            affordability: None,
            web_started_at: None,
            conversational_started_at: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            version: 0,
        };
        application.stamp_channel(channel, now);
        application
    }

    /// Record the first time a channel touched this application.
    pub fn stamp_channel(&mut self, channel: Channel, now: DateTime<Utc>) -> bool {
        let slot = match channel {
            Channel::Web => &mut self.web_started_at,
            Channel::Conversational => &mut self.conversational_started_at,
        };
        if slot.is_none() {
            *slot = Some(now);
            true
        } else {
            false
        }
    }

    /// Flat key/value view of the accumulated step data, keyed by the stable
    /// step-field names the channel adapters display.
    pub fn step_data(&self) -> BTreeMap<String, serde_json::Value> {
        let mut data = BTreeMap::new();
        for record in self.steps.values() {
            if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(record) {
                for (key, value) in fields {
                    if key == "step" || value.is_null() {
                        continue;
                    }
                    data.insert(key, value);
                }
            }
        }
        data
    }

    pub fn status_view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            consumer_id: self.consumer_id.clone(),
            status: self.status.label(),
            channel: self.channel.label(),
            current_step: self.current_step,
            amount: self.amount,
            term_months: self.term_months,
            purpose: self.purpose.clone(),
            terms: self.terms.clone(),
            affordability: self.affordability.clone(),
            step_data: self.step_data(),
        }
    }
}

/// Sanitized representation returned to channel adapters.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub consumer_id: ConsumerId,
    pub status: &'static str,
    pub channel: &'static str,
    pub current_step: u8,
    pub amount: f64,
    pub term_months: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<LoanTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordability: Option<AffordabilitySnapshot>,
    pub step_data: BTreeMap<String, serde_json::Value>,
}

/// How often a declared income or expense recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Monthly,
    Weekly,
    BiWeekly,
    Annual,
}

/// A consumer-declared income source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub consumer_id: ConsumerId,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub frequency: Frequency,
}

/// A consumer-declared recurring expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub consumer_id: ConsumerId,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub essential: bool,
}

/// Classification of a consumer's capacity to service new debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffordabilityStatus {
    Affordable,
    LimitedAffordability,
    NotAffordable,
}

impl AffordabilityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AffordabilityStatus::Affordable => "affordable",
            AffordabilityStatus::LimitedAffordability => "limited_affordability",
            AffordabilityStatus::NotAffordable => "not_affordable",
        }
    }
}

/// Derived affordability snapshot, one current record per consumer.
///
/// Recomputation replaces the previous record in full; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityAssessment {
    pub consumer_id: ConsumerId,
    pub gross_monthly_income: f64,
    pub total_monthly_expenses: f64,
    pub essential_expenses: f64,
    pub non_essential_expenses: f64,
    pub net_monthly_income: f64,
    pub debt_to_income_ratio: f64,
    pub expense_to_income_ratio: f64,
    pub available_funds: f64,
    pub status: AffordabilityStatus,
    pub notes: String,
    pub max_loan_amount: f64,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Lifecycle status of a generated credit agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Sent,
    Signed,
    Expired,
    Cancelled,
}

impl ContractStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Sent => "sent",
            ContractStatus::Signed => "signed",
            ContractStatus::Expired => "expired",
            ContractStatus::Cancelled => "cancelled",
        }
    }
}

/// One generated credit agreement for an approved application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub application_id: ApplicationId,
    pub consumer_id: ConsumerId,
    pub contract_type: String,
    pub content_ref: String,
    pub status: ContractStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub version: u32,
}

/// One active signing credential per contract.
///
/// Only the salted digest of the one-time code is stored; the raw code
/// travels out-of-band through the messaging capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningCredential {
    pub contract_id: ContractId,
    pub code_hash: String,
    pub salt: String,
    pub destination: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u8,
    pub valid: bool,
    pub signer: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Links a conversational contact address back to a draft so an interrupted
/// session can resume where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSession {
    pub consumer_id: ConsumerId,
    pub application_id: ApplicationId,
    pub contact_address: String,
    pub active: bool,
    pub opened_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
