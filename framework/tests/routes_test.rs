mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use coldmail::campaign::{CsvContacts, FixedClock, MemoryCursor, MemoryFailureLog};
use coldmail::routing::api_router;
use coldmail::{Campaign, SelectionPolicy};
use serde_json::Value;
use tower::ServiceExt;

use common::*;

async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn router_for(harness: Harness) -> (Router, Harness) {
    (api_router(harness.campaign.clone()), harness)
}

#[tokio::test]
async fn health_and_index_respond() {
    let (router, _) = router_for(Harness::new(SelectionPolicy::SequentialCursor, three_contacts()));

    let (status, body) = call(router.clone(), Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(router, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "coldmail");
}

#[tokio::test]
async fn cron_endpoint_sends_on_get_and_post() {
    let (router, h) = router_for(Harness::new(SelectionPolicy::SequentialCursor, three_contacts()));

    let (status, body) = call(router.clone(), Method::GET, "/cron/send-emails").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["email_details"]["to"], "ada@example.com");
    assert_eq!(body["email_details"]["recipient_number"], 1);
    assert_eq!(body["trigger"], "scheduled");

    let (status, body) = call(router, Method::POST, "/cron/send-emails").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_details"]["to"], "bob@example.com");

    assert_eq!(h.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_email_endpoint_marks_manual() {
    let (router, h) = router_for(Harness::new(SelectionPolicy::SequentialCursor, three_contacts()));

    let (status, body) = call(router, Method::POST, "/test-email").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trigger"], "manual");
    assert_eq!(body["mode"], "manual");
    assert!(h.mailer.sent()[0].subject.starts_with("[MANUAL TEST] "));
}

#[tokio::test]
async fn failed_send_is_still_200() {
    let campaign = Campaign::new(
        settings(SelectionPolicy::SequentialCursor),
        Arc::new(coldmail::campaign::MemoryContacts::new(three_contacts())),
        Arc::new(MemoryCursor::new(0)),
        Arc::new(MemoryFailureLog::new()),
    )
    .with_mailer(Arc::new(RejectingMailer("535 auth failed".into())))
    .with_clock(Arc::new(FixedClock(TUESDAY_10)));

    let (status, body) = call(api_router(Arc::new(campaign)), Method::GET, "/cron/send-emails").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["email_details"]["saved_to_failed"], true);
}

#[tokio::test]
async fn missing_credentials_is_500_jsend() {
    let campaign = Campaign::new(
        settings(SelectionPolicy::SequentialCursor),
        Arc::new(coldmail::campaign::MemoryContacts::new(three_contacts())),
        Arc::new(MemoryCursor::new(0)),
        Arc::new(MemoryFailureLog::new()),
    )
    .with_clock(Arc::new(FixedClock(TUESDAY_10)));

    let (status, body) = call(api_router(Arc::new(campaign)), Method::POST, "/cron/send-emails").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 500);
}

#[tokio::test]
async fn missing_list_is_503() {
    let dir = tempfile::tempdir().unwrap();
    let campaign = Campaign::new(
        settings(SelectionPolicy::SequentialCursor),
        Arc::new(CsvContacts::new(dir.path().join("absent.csv"))),
        Arc::new(MemoryCursor::new(0)),
        Arc::new(MemoryFailureLog::new()),
    )
    .with_mailer(Arc::new(RecordingMailer::default()))
    .with_clock(Arc::new(FixedClock(TUESDAY_10)));
    let router = api_router(Arc::new(campaign));

    let (status, body) = call(router.clone(), Method::GET, "/cron/send-emails").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");

    let (status, _) = call(router.clone(), Method::GET, "/debug-csv").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = call(router, Method::GET, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["csv_status"]["file_exists"], false);
}

#[tokio::test]
async fn reset_and_preview_endpoints() {
    let (router, h) = router_for(Harness::new(SelectionPolicy::SequentialCursor, three_contacts()));
    call(router.clone(), Method::GET, "/cron/send-emails").await;

    let (status, body) = call(router.clone(), Method::GET, "/debug-csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], "2/3");
    assert_eq!(body["next_few_recipients"][0]["email"], "bob@example.com");

    let (status, body) = call(router.clone(), Method::POST, "/reset-counter").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counter"], 0);

    let (_, body) = call(router, Method::GET, "/status").await;
    assert_eq!(body["csv_status"]["current_counter"], 0);
    assert_eq!(body["email_configured"], true);
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn reset_requires_post() {
    let (router, _) = router_for(Harness::new(SelectionPolicy::SequentialCursor, three_contacts()));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/reset-counter")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
