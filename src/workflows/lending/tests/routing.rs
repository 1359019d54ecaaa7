use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::lending::domain::{ApplicationStatus, Channel};

fn post(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn create_route_returns_a_fresh_draft_view() {
    let harness = harness();

    let response = harness
        .router()
        .oneshot(post(
            "/api/v1/loans",
            json!({
                "consumer_id": "cons-naledi",
                "channel": "web",
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("draft")));
    assert_eq!(payload.get("current_step"), Some(&json!(0)));
    assert!(payload.get("application_id").is_some());
}

#[tokio::test]
async fn step_route_accepts_flattened_payloads() {
    let harness = harness();
    let draft = harness
        .applications
        .create_draft(&consumer(), Channel::Web, None)
        .expect("draft created");

    let response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/loans/{}/steps", draft.id.0),
            json!({
                "consumer_id": "cons-naledi",
                "step": "loan_request",
                "amount": 10000.0,
                "term_months": 12,
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("current_step"), Some(&json!(3)));
    // The loan request step also carries the preview terms back.
    assert_eq!(
        payload
            .get("terms")
            .and_then(|terms| terms.get("annual_interest_rate")),
        Some(&json!(12.0))
    );
}

#[tokio::test]
async fn submit_route_reports_validation_problems() {
    let harness = harness();
    let draft = harness
        .applications
        .create_draft(&consumer(), Channel::Web, None)
        .expect("draft created");

    let response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/loans/{}/submit", draft.id.0),
            json!({ "consumer_id": "cons-naledi" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    let problems = payload
        .get("problems")
        .and_then(Value::as_array)
        .expect("problems listed");
    assert!(problems.contains(&json!("loan amount is required")));
    assert!(problems.contains(&json!("bank name is required")));
}

#[tokio::test]
async fn submit_route_accepts_complete_drafts() {
    let harness = harness();
    let consumer = consumer();
    seed_affordable_finances(&harness.store, &consumer);
    let application = complete_draft(&harness, &consumer);

    let response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/loans/{}/submit", application.id.0),
            json!({ "consumer_id": "cons-naledi" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("pending")));
}

#[tokio::test]
async fn get_route_hides_other_consumers_applications() {
    let harness = harness();
    let draft = harness
        .applications
        .create_draft(&consumer(), Channel::Web, None)
        .expect("draft created");

    let response = harness
        .router()
        .oneshot(
            Request::get(format!(
                "/api/v1/consumers/cons-intruder/loans/{}",
                draft.id.0
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resume_route_reports_the_absence_of_a_draft() {
    let harness = harness();

    let response = harness
        .router()
        .oneshot(post(
            "/api/v1/loans/resume",
            json!({
                "consumer_id": "cons-naledi",
                "channel": "conversational",
                "contact_address": "+27821234567",
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("no_draft")));
}

#[tokio::test]
async fn affordability_route_returns_the_assessment() {
    let harness = harness();
    let consumer = consumer();
    seed_affordable_finances(&harness.store, &consumer);

    let response = harness
        .router()
        .oneshot(post(
            "/api/v1/consumers/cons-naledi/affordability",
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("affordable")));
    assert_eq!(payload.get("gross_monthly_income"), Some(&json!(25000.0)));
}

#[tokio::test]
async fn signing_routes_walk_the_contract_to_signed() {
    let harness = harness();
    let consumer = consumer();
    let application = complete_draft(&harness, &consumer);
    force_status(&harness.store, &application.id, ApplicationStatus::Approved);
    let contract_id = seed_contract(&harness, &application.id, &consumer);

    let issue_response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/contracts/{}/code", contract_id.0),
            json!({
                "consumer_id": "cons-naledi",
                "destination": "+27821234567",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(issue_response.status(), StatusCode::CREATED);
    let issued = read_json_body(issue_response).await;
    let code = issued
        .get("code")
        .and_then(Value::as_str)
        .expect("code revealed in test mode")
        .to_string();

    let sign_response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/contracts/{}/sign", contract_id.0),
            json!({
                "consumer_id": "cons-naledi",
                "code": code,
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(sign_response.status(), StatusCode::OK);
    let receipt = read_json_body(sign_response).await;
    assert_eq!(
        receipt.get("application_id"),
        Some(&json!(application.id.0))
    );
}

#[tokio::test]
async fn sign_route_maps_wrong_codes_to_bad_request() {
    let harness = harness();
    let consumer = consumer();
    let application = complete_draft(&harness, &consumer);
    force_status(&harness.store, &application.id, ApplicationStatus::Approved);
    let contract_id = seed_contract(&harness, &application.id, &consumer);
    harness
        .signing
        .issue_credential(&contract_id, &consumer, "+27821234567")
        .expect("code issued");

    let response = harness
        .router()
        .oneshot(post(
            &format!("/api/v1/contracts/{}/sign", contract_id.0),
            json!({
                "consumer_id": "cons-naledi",
                "code": "012345",
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("incorrect code"));
}
