//! Affordability assessment over a consumer's declared finances.

mod rules;

use std::sync::Arc;

use chrono::Duration;

use super::domain::{AffordabilityAssessment, AffordabilityStatus, ConsumerId};
use super::error::LendingError;
use super::repository::{Clock, LendingStore};

/// Days an assessment stays current before a recomputation is required.
pub const ASSESSMENT_VALIDITY_DAYS: i64 = 30;

/// Computes and persists the current affordability assessment per consumer.
///
/// Recomputation is a full-replace upsert keyed by consumer, so either
/// channel may trigger it concurrently and both observe the same figures on
/// the next read.
pub struct AffordabilityEngine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> AffordabilityEngine<S>
where
    S: LendingStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Normalize the consumer's income/expense records to monthly figures,
    /// classify borrowing capacity, and replace the stored assessment.
    pub fn compute_assessment(
        &self,
        consumer: &ConsumerId,
    ) -> Result<AffordabilityAssessment, LendingError> {
        let incomes = self.store.incomes(consumer)?;
        let expenses = self.store.expenses(consumer)?;

        let figures = rules::figures(&incomes, &expenses);
        let status = rules::classify(&figures);
        let max_loan_amount = rules::maximum_loan(figures.net_monthly_income);
        let now = self.clock.now();

        let assessment = AffordabilityAssessment {
            consumer_id: consumer.clone(),
            gross_monthly_income: figures.gross_monthly_income,
            total_monthly_expenses: figures.total_monthly_expenses,
            essential_expenses: figures.essential_expenses,
            non_essential_expenses: figures.non_essential_expenses,
            net_monthly_income: figures.net_monthly_income,
            debt_to_income_ratio: figures.debt_to_income_ratio,
            expense_to_income_ratio: figures.expense_to_income_ratio,
            available_funds: figures.available_funds,
            status,
            notes: assessment_notes(status, &figures),
            max_loan_amount,
            computed_at: now,
            expires_at: now + Duration::days(ASSESSMENT_VALIDITY_DAYS),
        };

        self.store.upsert_assessment(assessment.clone())?;
        Ok(assessment)
    }
}

fn assessment_notes(status: AffordabilityStatus, figures: &rules::AffordabilityFigures) -> String {
    match status {
        AffordabilityStatus::Affordable => format!(
            "expenses are {:.0}% of gross income; net R{:.2}/month available",
            figures.expense_to_income_ratio * 100.0,
            figures.net_monthly_income
        ),
        AffordabilityStatus::LimitedAffordability => format!(
            "net income R{:.2}/month is under 10% of gross; limited capacity for new debt",
            figures.net_monthly_income
        ),
        AffordabilityStatus::NotAffordable => format!(
            "expenses are {:.0}% of gross income; no capacity for new debt",
            figures.expense_to_income_ratio * 100.0
        ),
    }
}

/// Classify a gross-income/expense pair without touching stored records.
/// Used by the CLI quote command for quick previews.
pub fn classify_preview(gross_monthly_income: f64, total_monthly_expenses: f64) -> AffordabilityStatus {
    let figures = rules::AffordabilityFigures {
        gross_monthly_income,
        total_monthly_expenses,
        essential_expenses: total_monthly_expenses,
        non_essential_expenses: 0.0,
        net_monthly_income: gross_monthly_income - total_monthly_expenses,
        debt_to_income_ratio: if gross_monthly_income > 0.0 {
            total_monthly_expenses / gross_monthly_income
        } else {
            0.0
        },
        expense_to_income_ratio: if gross_monthly_income > 0.0 {
            total_monthly_expenses / gross_monthly_income
        } else {
            0.0
        },
        available_funds: gross_monthly_income - total_monthly_expenses,
    };
    rules::classify(&figures)
}
