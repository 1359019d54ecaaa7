use super::repository::RepositoryError;

/// Per-request outcomes surfaced to the channel adapters. Nothing here is
/// fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum LendingError {
    #[error("record not found")]
    NotFound,
    #[error("{action} is not allowed while the record is {state}")]
    InvalidState { state: String, action: &'static str },
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("proposed terms breach regulatory ceilings: {message}")]
    ComplianceFailed { message: String },
    #[error("no signing code on record, request a new code")]
    CredentialMissing,
    #[error("signing code expired, request a new code")]
    CredentialExpired,
    #[error("too many attempts, request a new code")]
    AttemptsExceeded,
    #[error("incorrect code, {remaining} attempt(s) remaining")]
    CodeMismatch { remaining: u8 },
    #[error("contract already signed")]
    AlreadySigned,
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl LendingError {
    pub(crate) fn invalid_state(state: &str, action: &'static str) -> Self {
        Self::InvalidState {
            state: state.to_string(),
            action,
        }
    }
}
