use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::workflows::lending::affordability::AffordabilityEngine;
use crate::workflows::lending::application::LoanApplicationService;
use crate::workflows::lending::domain::{
    ApplicationId, Channel, ConsumerId, Contract, ContractId, ContractStatus, Expense, Frequency,
    Income, LoanApplication,
};
use crate::workflows::lending::memory::MemoryStore;
use crate::workflows::lending::repository::{
    Clock, DeliveryError, LendingStore, MessageSender,
};
use crate::workflows::lending::router::{lending_router, LendingState};
use crate::workflows::lending::signing::SigningWorkflow;
use crate::workflows::lending::steps::StepInput;

/// Clock the tests can move by hand.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn at_start() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 6, 2, 9, 0, 0)
            .single()
            .expect("valid start instant");
        Self {
            now: Mutex::new(start),
        }
    }

    pub(super) fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Messenger double recording every send, with a switch to simulate a
/// provider outage.
#[derive(Default)]
pub(super) struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub(super) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("messenger mutex poisoned").clone()
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl MessageSender for RecordingMessenger {
    fn send_text(&self, destination: &str, body: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DeliveryError::Transport("provider offline".to_string()));
        }
        self.sent
            .lock()
            .expect("messenger mutex poisoned")
            .push((destination.to_string(), body.to_string()));
        Ok(())
    }

    fn send_template(
        &self,
        destination: &str,
        template: &str,
        params: &[String],
    ) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DeliveryError::Transport("provider offline".to_string()));
        }
        self.sent
            .lock()
            .expect("messenger mutex poisoned")
            .push((destination.to_string(), format!("{template}:{params:?}")));
        Ok(())
    }
}

pub(super) struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub messenger: Arc<RecordingMessenger>,
    pub applications: Arc<LoanApplicationService<MemoryStore>>,
    pub signing: Arc<SigningWorkflow<MemoryStore, RecordingMessenger>>,
}

impl Harness {
    pub(super) fn router(&self) -> axum::Router {
        lending_router(LendingState {
            applications: self.applications.clone(),
            signing: self.signing.clone(),
        })
    }
}

pub(super) fn harness() -> Harness {
    harness_with_reveal(true)
}

pub(super) fn harness_with_reveal(reveal_codes: bool) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(ManualClock::at_start());
    let messenger = Arc::new(RecordingMessenger::default());
    let affordability = Arc::new(AffordabilityEngine::new(
        store.clone(),
        clock.clone() as Arc<dyn Clock>,
    ));
    let applications = Arc::new(LoanApplicationService::new(
        store.clone(),
        affordability,
        clock.clone() as Arc<dyn Clock>,
    ));
    let signing = Arc::new(SigningWorkflow::new(
        store.clone(),
        messenger.clone(),
        clock.clone() as Arc<dyn Clock>,
        reveal_codes,
    ));

    Harness {
        store,
        clock,
        messenger,
        applications,
        signing,
    }
}

pub(super) fn consumer() -> ConsumerId {
    ConsumerId("cons-naledi".to_string())
}

pub(super) fn income(consumer: &ConsumerId, amount: f64, frequency: Frequency) -> Income {
    Income {
        consumer_id: consumer.clone(),
        category: "salary".to_string(),
        description: "monthly salary".to_string(),
        amount,
        frequency,
    }
}

pub(super) fn expense(
    consumer: &ConsumerId,
    amount: f64,
    frequency: Frequency,
    essential: bool,
) -> Expense {
    Expense {
        consumer_id: consumer.clone(),
        category: if essential { "housing" } else { "leisure" }.to_string(),
        description: "recurring expense".to_string(),
        amount,
        frequency,
        essential,
    }
}

/// Seed an affordable profile: R25,000 gross, R8,000 total expenses.
pub(super) fn seed_affordable_finances(store: &MemoryStore, consumer: &ConsumerId) {
    store.add_income(income(consumer, 25_000.0, Frequency::Monthly));
    store.add_expense(expense(consumer, 6_000.0, Frequency::Monthly, true));
    store.add_expense(expense(consumer, 2_000.0, Frequency::Monthly, false));
}

pub(super) fn bank_details_step() -> StepInput {
    StepInput::BankDetails {
        bank_name: Some("Capitec".to_string()),
        account_number: Some("1234567890".to_string()),
        account_holder: Some("N Mokoena".to_string()),
    }
}

/// Walk a fresh draft through all seven steps without submitting.
pub(super) fn complete_draft(harness: &Harness, consumer: &ConsumerId) -> LoanApplication {
    let draft = harness
        .applications
        .create_draft(consumer, Channel::Web, None)
        .expect("draft created");

    let steps = [
        StepInput::PersonalDetails {
            full_name: Some("Naledi Mokoena".to_string()),
            id_number: Some("9001015800086".to_string()),
            email: Some("naledi@example.com".to_string()),
        },
        StepInput::Employment {
            employer: Some("Acme Logistics".to_string()),
            occupation: Some("Dispatcher".to_string()),
            employed_since: Some("2019-03".to_string()),
        },
        StepInput::LoanRequest {
            amount: Some(10_000.0),
            term_months: Some(12),
        },
        StepInput::Purpose {
            purpose: Some("school fees".to_string()),
        },
        StepInput::AffordabilityReview {
            figures_confirmed: Some(true),
        },
        bank_details_step(),
        StepInput::Confirmation {
            accepted_terms: Some(true),
        },
    ];

    let mut application = draft;
    for step in steps {
        application = harness
            .applications
            .advance_step(&application.id, consumer, step)
            .expect("step advances");
    }
    application
}

/// Seed a signable contract tied to an application.
pub(super) fn seed_contract(
    harness: &Harness,
    application_id: &ApplicationId,
    consumer: &ConsumerId,
) -> ContractId {
    let contract_id = ContractId("ctr-001".to_string());
    let now = harness.clock.now();
    harness.store.seed_contract(Contract {
        id: contract_id.clone(),
        application_id: application_id.clone(),
        consumer_id: consumer.clone(),
        contract_type: "credit_agreement".to_string(),
        content_ref: "documents/ctr-001.html".to_string(),
        status: ContractStatus::Draft,
        issued_at: now,
        expires_at: now + Duration::days(7),
        sent_at: None,
        signed_at: None,
        version: 1,
    });
    contract_id
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Force an application into a given status directly through the store.
pub(super) fn force_status(
    store: &MemoryStore,
    application_id: &ApplicationId,
    status: crate::workflows::lending::domain::ApplicationStatus,
) {
    let application = store
        .application(application_id)
        .expect("store reachable")
        .expect("application present");
    let expected = application.version;
    let mut application = application;
    application.status = status;
    store
        .update_application(application, expected)
        .expect("status forced");
}
