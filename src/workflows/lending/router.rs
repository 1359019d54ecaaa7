use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::application::LoanApplicationService;
use super::domain::{ApplicationId, Channel, ConsumerId, ContractId};
use super::error::LendingError;
use super::repository::{LendingStore, MessageSender, RepositoryError};
use super::signing::SigningWorkflow;
use super::steps::StepInput;

/// Shared handler state for the lending endpoints.
pub struct LendingState<S, M> {
    pub applications: Arc<LoanApplicationService<S>>,
    pub signing: Arc<SigningWorkflow<S, M>>,
}

impl<S, M> Clone for LendingState<S, M> {
    fn clone(&self) -> Self {
        Self {
            applications: Arc::clone(&self.applications),
            signing: Arc::clone(&self.signing),
        }
    }
}

/// Router builder exposing the channel-adapter HTTP endpoints.
pub fn lending_router<S, M>(state: LendingState<S, M>) -> Router
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    Router::new()
        .route("/api/v1/loans", post(create_draft_handler::<S, M>))
        .route("/api/v1/loans/resume", post(resume_handler::<S, M>))
        .route(
            "/api/v1/loans/:application_id/steps",
            post(advance_step_handler::<S, M>),
        )
        .route(
            "/api/v1/loans/:application_id/submit",
            post(submit_handler::<S, M>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/loans/:application_id",
            get(get_application_handler::<S, M>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/affordability",
            post(affordability_handler::<S, M>),
        )
        .route(
            "/api/v1/contracts/:contract_id/code",
            post(issue_code_handler::<S, M>),
        )
        .route(
            "/api/v1/contracts/:contract_id/sign",
            post(sign_handler::<S, M>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateDraftRequest {
    consumer_id: String,
    channel: Channel,
    #[serde(default)]
    contact_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResumeRequest {
    consumer_id: String,
    channel: Channel,
    #[serde(default)]
    contact_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdvanceStepRequest {
    consumer_id: String,
    #[serde(flatten)]
    input: StepInput,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    consumer_id: String,
}

#[derive(Debug, Deserialize)]
struct IssueCodeRequest {
    consumer_id: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
struct SignRequest {
    consumer_id: String,
    code: String,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
}

async fn create_draft_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Json(request): Json<CreateDraftRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.applications.create_draft(
        &ConsumerId(request.consumer_id),
        request.channel,
        request.contact_address.as_deref(),
    ) {
        Ok(application) => {
            (StatusCode::CREATED, Json(application.status_view())).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn resume_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Json(request): Json<ResumeRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.applications.resume(
        &ConsumerId(request.consumer_id),
        request.channel,
        request.contact_address.as_deref(),
    ) {
        Ok(Some(application)) => {
            (StatusCode::OK, Json(application.status_view())).into_response()
        }
        Ok(None) => {
            let payload = json!({ "status": "no_draft" });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn advance_step_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path(application_id): Path<String>,
    Json(request): Json<AdvanceStepRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.applications.advance_step(
        &ApplicationId(application_id),
        &ConsumerId(request.consumer_id),
        request.input,
    ) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

async fn submit_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path(application_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.applications.submit(
        &ApplicationId(application_id),
        &ConsumerId(request.consumer_id),
    ) {
        Ok(application) => {
            (StatusCode::ACCEPTED, Json(application.status_view())).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn get_application_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path((consumer_id, application_id)): Path<(String, String)>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state
        .applications
        .get(&ApplicationId(application_id), &ConsumerId(consumer_id))
    {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

async fn affordability_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path(consumer_id): Path<String>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state
        .applications
        .sync_affordability(&ConsumerId(consumer_id))
    {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn issue_code_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path(contract_id): Path<String>,
    Json(request): Json<IssueCodeRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.signing.issue_credential(
        &ContractId(contract_id),
        &ConsumerId(request.consumer_id),
        &request.destination,
    ) {
        Ok(issued) => (StatusCode::CREATED, Json(issued)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn sign_handler<S, M>(
    State(state): State<LendingState<S, M>>,
    Path(contract_id): Path<String>,
    Json(request): Json<SignRequest>,
) -> Response
where
    S: LendingStore + 'static,
    M: MessageSender + 'static,
{
    match state.signing.verify_credential(
        &ContractId(contract_id),
        &ConsumerId(request.consumer_id),
        &request.code,
        request.ip_address.as_deref(),
        request.user_agent.as_deref(),
    ) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: LendingError) -> Response {
    let status = match &err {
        LendingError::NotFound => StatusCode::NOT_FOUND,
        LendingError::InvalidState { .. } | LendingError::AlreadySigned => StatusCode::CONFLICT,
        LendingError::Validation(_) | LendingError::ComplianceFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LendingError::CredentialMissing | LendingError::CodeMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        LendingError::CredentialExpired => StatusCode::GONE,
        LendingError::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
        LendingError::Store(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LendingError::Store(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LendingError::Store(RepositoryError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match &err {
        LendingError::Validation(problems) => json!({
            "error": "validation failed",
            "problems": problems,
        }),
        other => json!({ "error": other.to_string() }),
    };

    (status, Json(payload)).into_response()
}
