//! Regulatory ceiling checks for proposed loan terms.
//!
//! Four independent dimensions (rate, fees, term/amount, affordability) plus
//! a composite that aggregates every violation so a caller can surface all
//! problems at once. A global enforcement flag on the configuration acts as
//! a kill switch: while disabled, every check trivially passes.

use serde::{Deserialize, Serialize};

/// Mutable singleton of regulatory ceilings, amended only by administrative
/// action. Defaults mirror the National Credit Act caps for short-term
/// credit: 27.5 % annual rate, initiation fee of R1,140 or 15 % of principal
/// (whichever is lower), R60 monthly service fee, 35 % debt-to-income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryConfig {
    pub max_annual_interest_rate: f64,
    pub max_initiation_fee: f64,
    pub max_initiation_fee_percent: f64,
    pub max_monthly_service_fee: f64,
    pub min_loan_amount: f64,
    pub max_loan_amount: f64,
    pub min_term_months: u32,
    pub max_term_months: u32,
    pub max_debt_to_income_percent: f64,
    pub min_safety_buffer: f64,
    pub cooling_off_days: u32,
    pub enforced: bool,
}

impl Default for RegulatoryConfig {
    fn default() -> Self {
        Self {
            max_annual_interest_rate: 27.5,
            max_initiation_fee: 1_140.0,
            max_initiation_fee_percent: 15.0,
            max_monthly_service_fee: 60.0,
            min_loan_amount: 500.0,
            max_loan_amount: 250_000.0,
            min_term_months: 1,
            max_term_months: 72,
            max_debt_to_income_percent: 35.0,
            min_safety_buffer: 1_000.0,
            cooling_off_days: 5,
            enforced: true,
        }
    }
}

impl RegulatoryConfig {
    /// Initiation fee ceiling for a given principal: the flat cap or the
    /// percentage-of-principal cap, whichever is lower.
    pub fn initiation_fee_ceiling(&self, principal: f64) -> f64 {
        let percentage_cap = principal * self.max_initiation_fee_percent / 100.0;
        self.max_initiation_fee.min(percentage_cap)
    }
}

/// Machine-readable outcome category for a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCode {
    Compliant,
    RateExceeded,
    FeesExceeded,
    TermsOutOfBounds,
    AffordabilityBreached,
    MultipleViolations,
}

/// Result of a single check or the composite validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub compliant: bool,
    pub code: ComplianceCode,
    pub message: String,
}

impl ComplianceResult {
    fn pass() -> Self {
        Self {
            compliant: true,
            code: ComplianceCode::Compliant,
            message: "compliant".to_string(),
        }
    }

    fn fail(code: ComplianceCode, violations: Vec<String>) -> Self {
        Self {
            compliant: false,
            code,
            message: violations.join("; "),
        }
    }
}

/// Terms proposed for validation against the configured ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTerms {
    pub amount: f64,
    pub term_months: u32,
    pub annual_interest_rate: f64,
    pub initiation_fee: f64,
    pub monthly_service_fee: f64,
    pub monthly_installment: f64,
    pub gross_monthly_income: f64,
    pub total_monthly_expenses: f64,
}

/// Stateless validator over a [`RegulatoryConfig`].
pub struct ComplianceValidator;

impl ComplianceValidator {
    /// Central kill-switch guard consulted by every check.
    fn unenforced(config: &RegulatoryConfig) -> Option<ComplianceResult> {
        if config.enforced {
            None
        } else {
            Some(ComplianceResult::pass())
        }
    }

    pub fn check_interest_rate(config: &RegulatoryConfig, annual_rate: f64) -> ComplianceResult {
        if let Some(pass) = Self::unenforced(config) {
            return pass;
        }
        if annual_rate > config.max_annual_interest_rate {
            return ComplianceResult::fail(
                ComplianceCode::RateExceeded,
                vec![format!(
                    "interest rate {annual_rate:.2}% exceeds the maximum of {:.2}%",
                    config.max_annual_interest_rate
                )],
            );
        }
        ComplianceResult::pass()
    }

    pub fn check_fees(
        config: &RegulatoryConfig,
        principal: f64,
        initiation_fee: f64,
        monthly_service_fee: f64,
    ) -> ComplianceResult {
        if let Some(pass) = Self::unenforced(config) {
            return pass;
        }

        let mut violations = Vec::new();
        let initiation_ceiling = config.initiation_fee_ceiling(principal);
        if initiation_fee > initiation_ceiling {
            violations.push(format!(
                "initiation fee R{initiation_fee:.2} exceeds the cap of R{initiation_ceiling:.2}"
            ));
        }
        if monthly_service_fee > config.max_monthly_service_fee {
            violations.push(format!(
                "monthly service fee R{monthly_service_fee:.2} exceeds the cap of R{:.2}",
                config.max_monthly_service_fee
            ));
        }

        if violations.is_empty() {
            ComplianceResult::pass()
        } else {
            ComplianceResult::fail(ComplianceCode::FeesExceeded, violations)
        }
    }

    pub fn check_amount_and_term(
        config: &RegulatoryConfig,
        amount: f64,
        term_months: u32,
    ) -> ComplianceResult {
        if let Some(pass) = Self::unenforced(config) {
            return pass;
        }

        let mut violations = Vec::new();
        if amount < config.min_loan_amount {
            violations.push(format!(
                "loan amount R{amount:.2} is below the minimum of R{:.2}",
                config.min_loan_amount
            ));
        }
        if amount > config.max_loan_amount {
            violations.push(format!(
                "loan amount R{amount:.2} exceeds the maximum of R{:.2}",
                config.max_loan_amount
            ));
        }
        if term_months < config.min_term_months {
            violations.push(format!(
                "term of {term_months} month(s) is below the minimum of {}",
                config.min_term_months
            ));
        }
        if term_months > config.max_term_months {
            violations.push(format!(
                "term of {term_months} month(s) exceeds the maximum of {}",
                config.max_term_months
            ));
        }

        if violations.is_empty() {
            ComplianceResult::pass()
        } else {
            ComplianceResult::fail(ComplianceCode::TermsOutOfBounds, violations)
        }
    }

    pub fn check_affordability(
        config: &RegulatoryConfig,
        monthly_installment: f64,
        gross_monthly_income: f64,
        total_monthly_expenses: f64,
    ) -> ComplianceResult {
        if let Some(pass) = Self::unenforced(config) {
            return pass;
        }

        let mut violations = Vec::new();
        let debt_to_income = if gross_monthly_income > 0.0 {
            monthly_installment / gross_monthly_income * 100.0
        } else {
            0.0
        };
        let discretionary = gross_monthly_income - total_monthly_expenses;
        let remaining = discretionary - monthly_installment;

        if debt_to_income > config.max_debt_to_income_percent {
            violations.push(format!(
                "installment is {debt_to_income:.1}% of income, above the {:.1}% ceiling",
                config.max_debt_to_income_percent
            ));
        }
        if remaining < config.min_safety_buffer {
            violations.push(format!(
                "remaining income R{remaining:.2} is below the safety buffer of R{:.2}",
                config.min_safety_buffer
            ));
        }
        if monthly_installment > discretionary {
            violations.push(format!(
                "installment R{monthly_installment:.2} exceeds disposable income R{discretionary:.2}"
            ));
        }

        if violations.is_empty() {
            ComplianceResult::pass()
        } else {
            ComplianceResult::fail(ComplianceCode::AffordabilityBreached, violations)
        }
    }

    /// Run every check and aggregate all failure messages. A single failing
    /// dimension makes the whole result non-compliant.
    pub fn check_all(config: &RegulatoryConfig, terms: &ProposedTerms) -> ComplianceResult {
        if let Some(pass) = Self::unenforced(config) {
            return pass;
        }

        let results = [
            Self::check_interest_rate(config, terms.annual_interest_rate),
            Self::check_fees(
                config,
                terms.amount,
                terms.initiation_fee,
                terms.monthly_service_fee,
            ),
            Self::check_amount_and_term(config, terms.amount, terms.term_months),
            Self::check_affordability(
                config,
                terms.monthly_installment,
                terms.gross_monthly_income,
                terms.total_monthly_expenses,
            ),
        ];

        let failures: Vec<&ComplianceResult> =
            results.iter().filter(|result| !result.compliant).collect();

        match failures.as_slice() {
            [] => ComplianceResult::pass(),
            [single] => (*single).clone(),
            many => ComplianceResult::fail(
                ComplianceCode::MultipleViolations,
                many.iter().map(|result| result.message.clone()).collect(),
            ),
        }
    }
}
