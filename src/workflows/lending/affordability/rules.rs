use super::super::domain::{AffordabilityStatus, Expense, Frequency, Income};

/// Average weeks per month; deliberate approximation, not calendar math.
pub(crate) const WEEKLY_FACTOR: f64 = 4.33;
/// Average fortnights per month; same approximation basis.
pub(crate) const BI_WEEKLY_FACTOR: f64 = 2.17;

/// Ratio above which a consumer is classified as not affordable.
pub(crate) const RATIO_CEILING: f64 = 0.35;
/// Net income below this share of gross marks limited affordability.
pub(crate) const LIMITED_MARGIN: f64 = 0.10;

/// Share of net income reserved before sizing the maximum loan.
pub(crate) const MAX_LOAN_RESERVE: f64 = 0.20;
/// Fixed horizon used to invert the amortization formula.
pub(crate) const MAX_LOAN_TERM_MONTHS: i32 = 36;
/// Fixed annual rate used to invert the amortization formula.
pub(crate) const MAX_LOAN_ANNUAL_RATE: f64 = 0.11;

fn monthly_equivalent(amount: f64, frequency: Frequency) -> f64 {
    match frequency {
        Frequency::Weekly => amount * WEEKLY_FACTOR,
        Frequency::BiWeekly => amount * BI_WEEKLY_FACTOR,
        Frequency::Annual => amount / 12.0,
        Frequency::Monthly => amount,
    }
}

/// Normalized monthly totals derived from the raw income/expense records.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AffordabilityFigures {
    pub gross_monthly_income: f64,
    pub total_monthly_expenses: f64,
    pub essential_expenses: f64,
    pub non_essential_expenses: f64,
    pub net_monthly_income: f64,
    pub debt_to_income_ratio: f64,
    pub expense_to_income_ratio: f64,
    pub available_funds: f64,
}

pub(crate) fn figures(incomes: &[Income], expenses: &[Expense]) -> AffordabilityFigures {
    let gross_monthly_income: f64 = incomes
        .iter()
        .map(|income| monthly_equivalent(income.amount, income.frequency))
        .sum();
    let total_monthly_expenses: f64 = expenses
        .iter()
        .map(|expense| monthly_equivalent(expense.amount, expense.frequency))
        .sum();
    let essential_expenses: f64 = expenses
        .iter()
        .filter(|expense| expense.essential)
        .map(|expense| monthly_equivalent(expense.amount, expense.frequency))
        .sum();
    let non_essential_expenses = total_monthly_expenses - essential_expenses;
    let net_monthly_income = gross_monthly_income - total_monthly_expenses;

    // Both ratios are computed identically today. Expense-to-income should
    // probably exclude debt-service expenses, but the distinction is pending
    // product clarification, so the duplication stands.
    let ratio = if gross_monthly_income > 0.0 {
        total_monthly_expenses / gross_monthly_income
    } else {
        0.0
    };

    AffordabilityFigures {
        gross_monthly_income,
        total_monthly_expenses,
        essential_expenses,
        non_essential_expenses,
        net_monthly_income,
        debt_to_income_ratio: ratio,
        expense_to_income_ratio: ratio,
        available_funds: net_monthly_income,
    }
}

/// Priority-ordered classification; the first matching rule wins.
pub(crate) fn classify(figures: &AffordabilityFigures) -> AffordabilityStatus {
    if figures.debt_to_income_ratio > RATIO_CEILING {
        return AffordabilityStatus::NotAffordable;
    }
    if figures.net_monthly_income <= 0.0 {
        return AffordabilityStatus::NotAffordable;
    }
    if figures.net_monthly_income < figures.gross_monthly_income * LIMITED_MARGIN {
        return AffordabilityStatus::LimitedAffordability;
    }
    AffordabilityStatus::Affordable
}

/// Invert the fixed 36-month, 11 %-per-annum amortization to solve the
/// principal a consumer's spare monthly capacity can service, keeping a 20 %
/// reserve of net income.
///
/// The factor construction is reproduced exactly for numeric compatibility
/// with the established figures.
pub(crate) fn maximum_loan(net_monthly_income: f64) -> f64 {
    let available = net_monthly_income * (1.0 - MAX_LOAN_RESERVE);
    let monthly_rate = MAX_LOAN_ANNUAL_RATE / 12.0;
    let factor = ((1.0 + monthly_rate) * (1.0 + monthly_rate).powi(MAX_LOAN_TERM_MONTHS - 1))
        / ((1.0 + monthly_rate).powi(MAX_LOAN_TERM_MONTHS) - 1.0);
    (available / factor).max(0.0)
}
