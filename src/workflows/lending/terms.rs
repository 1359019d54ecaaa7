//! Loan term derivation used mid-wizard and at submission.
//!
//! The constants are fixed business values, not configuration: a 12 % base
//! annual rate, a 1-point discount above R100,000, a 0.5-point premium past
//! 24 months, clamped to the 8–18 % band.

use serde::{Deserialize, Serialize};

pub const BASE_ANNUAL_RATE: f64 = 12.0;
pub const LARGE_LOAN_THRESHOLD: f64 = 100_000.0;
pub const LARGE_LOAN_DISCOUNT: f64 = 1.0;
pub const LONG_TERM_MONTHS: u32 = 24;
pub const LONG_TERM_PREMIUM: f64 = 0.5;
pub const MIN_ANNUAL_RATE: f64 = 8.0;
pub const MAX_ANNUAL_RATE: f64 = 18.0;

/// Computed pricing for an amount/term pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub annual_interest_rate: f64,
    pub monthly_payment: f64,
    pub total_repayable: f64,
}

/// Derive the annual rate, amortized monthly payment, and total repayable.
///
/// A zero term cannot be amortized; it is priced as a single installment.
pub fn quote(amount: f64, term_months: u32) -> LoanTerms {
    let mut rate = BASE_ANNUAL_RATE;
    if amount > LARGE_LOAN_THRESHOLD {
        rate -= LARGE_LOAN_DISCOUNT;
    }
    if term_months > LONG_TERM_MONTHS {
        rate += LONG_TERM_PREMIUM;
    }
    let rate = rate.clamp(MIN_ANNUAL_RATE, MAX_ANNUAL_RATE);

    let months = term_months.max(1);
    let monthly_rate = rate / 100.0 / 12.0;
    let monthly_payment = if monthly_rate == 0.0 {
        amount / months as f64
    } else {
        amount * monthly_rate / (1.0 - (1.0 + monthly_rate).powi(-(months as i32)))
    };
    let total_repayable = monthly_payment * months as f64;

    LoanTerms {
        annual_interest_rate: rate,
        monthly_payment,
        total_repayable,
    }
}
