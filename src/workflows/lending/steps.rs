//! Typed per-step wizard input.
//!
//! Each intake step owns a variant with only that step's fields. Merging is
//! field-wise: a later `Some` overwrites, a later `None` leaves the earlier
//! value untouched, and nothing is ever deleted. The same plan drives both
//! the web form and the conversational flow, so a consumer can switch
//! channels mid-wizard without losing anything either side captured.

use serde::{Deserialize, Serialize};

use super::domain::LoanApplication;

/// Step at which amount/term are captured and loan terms are previewed.
pub const TERM_PREVIEW_STEP: u8 = 3;
/// Step at which the affordability assessment is (re)computed.
pub const AFFORDABILITY_STEP: u8 = 5;
/// A draft must reach this step before submission is permitted.
pub const FINAL_STEP: u8 = 7;

/// Payload for one wizard step, tagged by step name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepInput {
    PersonalDetails {
        full_name: Option<String>,
        id_number: Option<String>,
        email: Option<String>,
    },
    Employment {
        employer: Option<String>,
        occupation: Option<String>,
        employed_since: Option<String>,
    },
    LoanRequest {
        amount: Option<f64>,
        term_months: Option<u32>,
    },
    Purpose {
        purpose: Option<String>,
    },
    AffordabilityReview {
        figures_confirmed: Option<bool>,
    },
    BankDetails {
        bank_name: Option<String>,
        account_number: Option<String>,
        account_holder: Option<String>,
    },
    Confirmation {
        accepted_terms: Option<bool>,
    },
}

impl StepInput {
    /// Position of this step in the fixed seven-step plan.
    pub const fn number(&self) -> u8 {
        match self {
            StepInput::PersonalDetails { .. } => 1,
            StepInput::Employment { .. } => 2,
            StepInput::LoanRequest { .. } => TERM_PREVIEW_STEP,
            StepInput::Purpose { .. } => 4,
            StepInput::AffordabilityReview { .. } => AFFORDABILITY_STEP,
            StepInput::BankDetails { .. } => 6,
            StepInput::Confirmation { .. } => FINAL_STEP,
        }
    }

    /// Merge `incoming` over `self`, keeping fields the newcomer left unset.
    pub fn merge(&mut self, incoming: StepInput) {
        fn keep<T>(current: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *current = incoming;
            }
        }

        match (self, incoming) {
            (
                StepInput::PersonalDetails {
                    full_name,
                    id_number,
                    email,
                },
                StepInput::PersonalDetails {
                    full_name: new_name,
                    id_number: new_id,
                    email: new_email,
                },
            ) => {
                keep(full_name, new_name);
                keep(id_number, new_id);
                keep(email, new_email);
            }
            (
                StepInput::Employment {
                    employer,
                    occupation,
                    employed_since,
                },
                StepInput::Employment {
                    employer: new_employer,
                    occupation: new_occupation,
                    employed_since: new_since,
                },
            ) => {
                keep(employer, new_employer);
                keep(occupation, new_occupation);
                keep(employed_since, new_since);
            }
            (
                StepInput::LoanRequest { amount, term_months },
                StepInput::LoanRequest {
                    amount: new_amount,
                    term_months: new_term,
                },
            ) => {
                keep(amount, new_amount);
                keep(term_months, new_term);
            }
            (
                StepInput::Purpose { purpose },
                StepInput::Purpose {
                    purpose: new_purpose,
                },
            ) => keep(purpose, new_purpose),
            (
                StepInput::AffordabilityReview { figures_confirmed },
                StepInput::AffordabilityReview {
                    figures_confirmed: new_confirmed,
                },
            ) => keep(figures_confirmed, new_confirmed),
            (
                StepInput::BankDetails {
                    bank_name,
                    account_number,
                    account_holder,
                },
                StepInput::BankDetails {
                    bank_name: new_bank,
                    account_number: new_number,
                    account_holder: new_holder,
                },
            ) => {
                keep(bank_name, new_bank);
                keep(account_number, new_number);
                keep(account_holder, new_holder);
            }
            (
                StepInput::Confirmation { accepted_terms },
                StepInput::Confirmation {
                    accepted_terms: new_accepted,
                },
            ) => keep(accepted_terms, new_accepted),
            // Variants are keyed by step number, so a cross-variant merge can
            // only happen through a caller bug; keep the stored record.
            (_current, _incoming) => {}
        }
    }
}

/// Merge a step payload into the application and route known fields into the
/// typed attributes the rest of the pipeline reads.
pub(crate) fn apply_step(application: &mut LoanApplication, input: StepInput) {
    let number = input.number();
    match application.steps.entry(number) {
        std::collections::btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge(input),
        std::collections::btree_map::Entry::Vacant(entry) => {
            entry.insert(input);
        }
    }

    // Route from the merged record rather than the raw payload so a partial
    // update never erases earlier values.
    match application.steps.get(&number) {
        Some(StepInput::LoanRequest { amount, term_months }) => {
            if let Some(amount) = amount {
                application.amount = *amount;
            }
            if let Some(term) = term_months {
                application.term_months = *term;
            }
        }
        Some(StepInput::Purpose { purpose }) => {
            if purpose.is_some() {
                application.purpose = purpose.clone();
            }
        }
        Some(StepInput::BankDetails {
            bank_name,
            account_number,
            account_holder,
        }) => {
            if bank_name.is_some() {
                application.bank_name = bank_name.clone();
            }
            if account_number.is_some() {
                application.account_number = account_number.clone();
            }
            if account_holder.is_some() {
                application.account_holder = account_holder.clone();
            }
        }
        _ => {}
    }
}
