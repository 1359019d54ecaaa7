use chrono::Duration;

use super::common::*;
use crate::workflows::lending::domain::{ApplicationStatus, ConsumerId, ContractStatus};
use crate::workflows::lending::error::LendingError;
use crate::workflows::lending::repository::{Clock, LendingStore};
use crate::workflows::lending::signing::{CODE_TTL_MINUTES, MAX_ATTEMPTS};

const DESTINATION: &str = "+27821234567";

fn signable_contract(harness: &Harness) -> crate::workflows::lending::domain::ContractId {
    let consumer = consumer();
    let application = complete_draft(harness, &consumer);
    force_status(&harness.store, &application.id, ApplicationStatus::Approved);
    seed_contract(harness, &application.id, &consumer)
}

#[test]
fn issuing_a_code_moves_the_contract_to_sent() {
    let harness = harness();
    let contract_id = signable_contract(&harness);

    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer(), DESTINATION)
        .expect("code issued");

    assert_eq!(issued.contract_id, contract_id);
    assert_eq!(
        issued.expires_at - harness.clock.now(),
        Duration::minutes(CODE_TTL_MINUTES)
    );
    let code = issued.code.expect("revealed in test mode");
    assert_eq!(code.len(), 6);

    let contract = harness
        .store
        .contract(&contract_id)
        .expect("store reachable")
        .expect("contract present");
    assert_eq!(contract.status, ContractStatus::Sent);
    assert!(contract.sent_at.is_some());

    // Only the salted hash is persisted, never the raw code.
    let credential = harness
        .store
        .credential_for(&contract_id)
        .expect("store reachable")
        .expect("credential stored");
    assert_ne!(credential.code_hash, code);
    assert_eq!(credential.attempts, 0);
    assert!(!credential.valid);

    let sent = harness.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, DESTINATION);
    assert!(sent[0].1.contains(&code));
}

#[test]
fn production_mode_never_reveals_the_code() {
    let harness = harness_with_reveal(false);
    let contract_id = signable_contract(&harness);

    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer(), DESTINATION)
        .expect("code issued");

    assert!(issued.code.is_none());
    // The messenger still carried it out-of-band.
    assert_eq!(harness.messenger.sent().len(), 1);
}

#[test]
fn delivery_failure_does_not_void_the_credential() {
    let harness = harness();
    let contract_id = signable_contract(&harness);
    harness.messenger.set_failing(true);

    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer(), DESTINATION)
        .expect("issuing survives a provider outage");

    assert!(harness.messenger.sent().is_empty());
    let code = issued.code.expect("revealed in test mode");

    harness.messenger.set_failing(false);
    let receipt = harness
        .signing
        .verify_credential(&contract_id, &consumer(), &code, None, None)
        .expect("credential still verifies");
    assert_eq!(receipt.contract_id, contract_id);
}

#[test]
fn correct_code_signs_the_contract_and_disburses_the_application() {
    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);
    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code issued");
    let code = issued.code.expect("revealed in test mode");

    let receipt = harness
        .signing
        .verify_credential(
            &contract_id,
            &consumer,
            &code,
            Some("196.25.1.10"),
            Some("lendcore-web/1.0"),
        )
        .expect("code verifies");

    let contract = harness
        .store
        .contract(&contract_id)
        .expect("store reachable")
        .expect("contract present");
    assert_eq!(contract.status, ContractStatus::Signed);
    assert_eq!(contract.signed_at, Some(receipt.signed_at));

    let credential = harness
        .store
        .credential_for(&contract_id)
        .expect("store reachable")
        .expect("credential stored");
    assert!(credential.valid);
    assert_eq!(credential.signer.as_deref(), Some("cons-naledi"));
    assert_eq!(credential.ip_address.as_deref(), Some("196.25.1.10"));
    assert_eq!(credential.user_agent.as_deref(), Some("lendcore-web/1.0"));

    let application = harness
        .store
        .application(&receipt.application_id)
        .expect("store reachable")
        .expect("application present");
    assert_eq!(application.status, ApplicationStatus::Disbursed);

    // Code delivery plus the signed confirmation template.
    let sent = harness.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].1.starts_with("contract_signed"));
}

#[test]
fn wrong_codes_burn_attempts_until_locked_out() {
    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);
    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code issued");
    let code = issued.code.expect("revealed in test mode");
    // A six-digit string the generator can never produce.
    let wrong = "012345";
    assert_ne!(wrong, code);

    for expected_remaining in (0..MAX_ATTEMPTS).rev() {
        match harness
            .signing
            .verify_credential(&contract_id, &consumer, wrong, None, None)
        {
            Err(LendingError::CodeMismatch { remaining }) => {
                assert_eq!(remaining, expected_remaining);
            }
            other => panic!("expected CodeMismatch, got {other:?}"),
        }
    }

    // Even the right code is refused once the ceiling is hit.
    match harness
        .signing
        .verify_credential(&contract_id, &consumer, &code, None, None)
    {
        Err(LendingError::AttemptsExceeded) => {}
        other => panic!("expected AttemptsExceeded, got {other:?}"),
    }

    // A reissue resets the counter.
    let reissued = harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code reissued");
    harness
        .signing
        .verify_credential(
            &contract_id,
            &consumer,
            &reissued.code.expect("revealed in test mode"),
            None,
            None,
        )
        .expect("fresh credential verifies");
}

#[test]
fn racing_wrong_codes_may_collapse_into_one_recorded_attempt() {
    use std::sync::{Arc, Barrier};

    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);
    harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code issued");

    // The counter update is read-increment-write, not compare-and-swap, so
    // two failures verified in parallel may both observe attempts == 0 and
    // record a single increment between them.
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let signing = harness.signing.clone();
            let contract_id = contract_id.clone();
            let consumer = consumer.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                signing.verify_credential(&contract_id, &consumer, "012345", None, None)
            })
        })
        .collect();

    for handle in handles {
        match handle.join().expect("verifier thread completes") {
            Err(LendingError::CodeMismatch { remaining }) => {
                assert!(remaining < MAX_ATTEMPTS);
            }
            other => panic!("expected CodeMismatch, got {other:?}"),
        }
    }

    let credential = harness
        .store
        .credential_for(&contract_id)
        .expect("store reachable")
        .expect("credential stored");
    assert!(
        (1..=2).contains(&credential.attempts),
        "two failures record one or two attempts, never zero or three"
    );
    assert!(!credential.valid);
}

#[test]
fn codes_expire_after_ten_minutes() {
    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);
    let issued = harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code issued");
    let code = issued.code.expect("revealed in test mode");

    harness.clock.advance(Duration::minutes(CODE_TTL_MINUTES + 1));

    match harness
        .signing
        .verify_credential(&contract_id, &consumer, &code, None, None)
    {
        Err(LendingError::CredentialExpired) => {}
        other => panic!("expected CredentialExpired, got {other:?}"),
    }
}

#[test]
fn verification_without_an_issued_code_is_rejected() {
    let harness = harness();
    let contract_id = signable_contract(&harness);

    match harness
        .signing
        .verify_credential(&contract_id, &consumer(), "123456", None, None)
    {
        Err(LendingError::CredentialMissing) => {}
        other => panic!("expected CredentialMissing, got {other:?}"),
    }
}

#[test]
fn signed_contracts_refuse_further_operations() {
    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);
    let code = harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
        .expect("code issued")
        .code
        .expect("revealed in test mode");
    harness
        .signing
        .verify_credential(&contract_id, &consumer, &code, None, None)
        .expect("code verifies");

    match harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
    {
        Err(LendingError::AlreadySigned) => {}
        other => panic!("expected AlreadySigned, got {other:?}"),
    }
    match harness
        .signing
        .verify_credential(&contract_id, &consumer, &code, None, None)
    {
        Err(LendingError::AlreadySigned) => {}
        other => panic!("expected AlreadySigned, got {other:?}"),
    }
}

#[test]
fn lapsed_contracts_expire_lazily_on_access() {
    let harness = harness();
    let consumer = consumer();
    let contract_id = signable_contract(&harness);

    // The seeded contract lapses after seven days.
    harness.clock.advance(Duration::days(8));

    match harness
        .signing
        .issue_credential(&contract_id, &consumer, DESTINATION)
    {
        Err(LendingError::InvalidState { state, .. }) => assert_eq!(state, "expired"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    // The lazy transition is persisted, not just reported.
    let contract = harness
        .store
        .contract(&contract_id)
        .expect("store reachable")
        .expect("contract present");
    assert_eq!(contract.status, ContractStatus::Expired);
}

#[test]
fn contracts_are_scoped_to_their_owner() {
    let harness = harness();
    let contract_id = signable_contract(&harness);
    let intruder = ConsumerId("cons-intruder".to_string());

    match harness
        .signing
        .issue_credential(&contract_id, &intruder, DESTINATION)
    {
        Err(LendingError::NotFound) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}
