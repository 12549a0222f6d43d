//! Tests for `src/gateway/` routes, driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use whatsapp_gateway::adapter::AdapterEvent;
use whatsapp_gateway::gateway::{build_router, GatewayState};
use whatsapp_gateway::lifecycle::LifecycleTracker;
use whatsapp_gateway::qr::QrDelivery;

use super::mock_adapter::{MockAdapter, SendBehavior};

const BODY_LIMIT: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_app(
    adapter: Arc<MockAdapter>,
    delivery: QrDelivery,
    send_timeout: Duration,
) -> (Router, LifecycleTracker) {
    let (tracker, lifecycle) = LifecycleTracker::new(delivery);
    let state = Arc::new(GatewayState {
        adapter,
        lifecycle,
        send_timeout,
    });
    (build_router(state, delivery), tracker)
}

fn default_app(adapter: Arc<MockAdapter>) -> (Router, LifecycleTracker) {
    test_app(adapter, QrDelivery::Endpoint, Duration::from_secs(5))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router handles request");
    let status = response.status();
    let body = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body should be readable");
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    call(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    let (status, bytes) = call(app, request).await;
    let json = serde_json::from_slice(&bytes).expect("response should be JSON");
    (status, json)
}

// ---------------------------------------------------------------------------
// /health and /status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok_in_every_lifecycle_state() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, tracker) = default_app(adapter);

    let events = [
        None,
        Some(AdapterEvent::Qr {
            qr: "2@challenge".to_owned(),
        }),
        Some(AdapterEvent::Ready),
        Some(AdapterEvent::Disconnected {
            reason: Some("LOGOUT".to_owned()),
        }),
        Some(AdapterEvent::AuthFailure { message: None }),
    ];

    for event in events {
        if let Some(event) = event {
            tracker.apply(event);
        }
        let (status, bytes) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&bytes).expect("health is JSON");
        assert_eq!(body["status"], "ok");
        let timestamp = body["timestamp"].as_str().expect("timestamp is a string");
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}

#[tokio::test]
async fn status_reflects_tracker_state() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, tracker) = default_app(adapter);

    let (_, bytes) = get(&app, "/status").await;
    let body: Value = serde_json::from_slice(&bytes).expect("status is JSON");
    assert_eq!(body["state"], "initializing");
    assert_eq!(body["qrAvailable"], false);

    tracker.apply(AdapterEvent::Qr {
        qr: "2@challenge".to_owned(),
    });
    let (_, bytes) = get(&app, "/status").await;
    let body: Value = serde_json::from_slice(&bytes).expect("status is JSON");
    assert_eq!(body["state"], "qr_pending");
    assert_eq!(body["qrAvailable"], true);

    tracker.apply(AdapterEvent::Disconnected {
        reason: Some("NAVIGATION".to_owned()),
    });
    let (_, bytes) = get(&app, "/status").await;
    let body: Value = serde_json::from_slice(&bytes).expect("status is JSON");
    assert_eq!(body["state"], "disconnected");
    assert_eq!(body["detail"], "NAVIGATION");
}

// ---------------------------------------------------------------------------
// /qr
// ---------------------------------------------------------------------------

#[tokio::test]
async fn qr_is_400_when_no_challenge_pending() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, tracker) = default_app(adapter);

    let (status, bytes) = get(&app, "/qr").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).expect("error is JSON");
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.contains("no QR code available")));

    tracker.apply(AdapterEvent::Qr {
        qr: "2@challenge".to_owned(),
    });
    tracker.apply(AdapterEvent::Ready);
    let (status, _) = get(&app, "/qr").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn qr_serves_html_with_embedded_image_while_pending() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, tracker) = default_app(adapter);
    tracker.apply(AdapterEvent::Qr {
        qr: "2@challenge,abc,def".to_owned(),
    });

    let (status, bytes) = get(&app, "/qr").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(bytes).expect("html is UTF-8");
    assert!(html.contains("<img src=\"data:image/svg+xml;base64,"));
}

#[tokio::test]
async fn qr_route_absent_in_terminal_mode() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = test_app(adapter, QrDelivery::Terminal, Duration::from_secs(5));
    let (status, _) = get(&app, "/qr").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// /send-receipt and /send-message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_receipt_forwards_normalized_destination() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let (status, body) = post_json(
        &app,
        "/send-receipt",
        &json!({ "phoneNumber": "+1 (555) 123-4567", "receiptText": "Total: $12.50" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Receipt sent successfully");
    assert_eq!(body["phoneNumber"], "+1 (555) 123-4567");
    let sent_at = body["sentAt"].as_str().expect("sentAt is a string");
    assert!(chrono::DateTime::parse_from_rfc3339(sent_at).is_ok());

    let sent = adapter.sent.lock().await;
    assert_eq!(
        *sent,
        vec![("15551234567@c.us".to_owned(), "Total: $12.50".to_owned())]
    );
}

#[tokio::test]
async fn send_message_succeeds_with_message_field() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let (status, body) = post_json(
        &app,
        "/send-message",
        &json!({ "phoneNumber": "15551234567", "message": "hello" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Message sent successfully");
    assert_eq!(adapter.sends(), 1);
}

#[tokio::test]
async fn missing_fields_are_400_and_never_reach_adapter() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let cases = [
        ("/send-receipt", json!({})),
        ("/send-receipt", json!({ "phoneNumber": "15551234567" })),
        ("/send-receipt", json!({ "receiptText": "hi" })),
        ("/send-receipt", json!({ "phoneNumber": "", "receiptText": "hi" })),
        ("/send-receipt", json!({ "phoneNumber": "15551234567", "receiptText": "" })),
        ("/send-receipt", json!({ "phoneNumber": null, "receiptText": "hi" })),
        ("/send-message", json!({})),
        ("/send-message", json!({ "phoneNumber": "15551234567" })),
        ("/send-message", json!({ "message": "hi" })),
        ("/send-message", json!({ "phoneNumber": "15551234567", "receiptText": "wrong field" })),
    ];

    for (uri, payload) in cases {
        let (status, body) = post_json(&app, uri, &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {payload}");
        let expected = if uri == "/send-receipt" {
            "Missing phoneNumber or receiptText"
        } else {
            "Missing phoneNumber or message"
        };
        assert_eq!(body["error"], expected);
    }

    assert_eq!(adapter.sends(), 0);
}

#[tokio::test]
async fn unreadable_bodies_are_400() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let malformed = Request::builder()
        .method("POST")
        .uri("/send-message")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("valid request");
    let (status, _) = call(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/send-receipt")
        .body(Body::empty())
        .expect("valid request");
    let (status, _) = call(&app, no_content_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/send-message",
        &json!({ "phoneNumber": 15551234567_u64, "message": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(adapter.sends(), 0);
}

#[tokio::test]
async fn phone_number_without_digits_is_400() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Accept));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let (status, body) = post_json(
        &app,
        "/send-message",
        &json!({ "phoneNumber": "call me maybe", "message": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "phoneNumber must contain at least one digit");
    assert_eq!(adapter.sends(), 0);
}

#[tokio::test]
async fn adapter_rejection_is_500_with_details_on_both_routes() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Reject(
        "WhatsApp client is not ready".to_owned(),
    )));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let (status, body) = post_json(
        &app,
        "/send-receipt",
        &json!({ "phoneNumber": "15551234567", "receiptText": "r" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send receipt");
    assert_eq!(body["details"], "WhatsApp client is not ready");

    let (status, body) = post_json(
        &app,
        "/send-message",
        &json!({ "phoneNumber": "15551234567", "message": "m" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send message");
    assert_eq!(body["details"], "WhatsApp client is not ready");

    // One attempt per request, no retries.
    assert_eq!(adapter.sends(), 2);
}

#[tokio::test]
async fn hung_adapter_times_out_with_504() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Hang));
    let (app, _tracker) = test_app(
        Arc::clone(&adapter),
        QrDelivery::Endpoint,
        Duration::from_millis(50),
    );

    let (status, body) = post_json(
        &app,
        "/send-message",
        &json!({ "phoneNumber": "15551234567", "message": "m" }),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "Failed to send message");
    assert_eq!(adapter.sends(), 1);
}

#[tokio::test]
async fn concurrent_sends_get_their_own_responses() {
    let adapter = Arc::new(MockAdapter::new(SendBehavior::Staggered));
    let (app, _tracker) = default_app(Arc::clone(&adapter));

    let mut handles = Vec::new();
    for i in 0..10_u32 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let phone = format!("+1 555 000 000{i}");
            let (status, body) = post_json(
                &app,
                "/send-message",
                &json!({ "phoneNumber": phone, "message": format!("msg {i}") }),
            )
            .await;
            (phone, status, body)
        }));
    }

    for handle in handles {
        let (phone, status, body) = handle.await.expect("request task should not panic");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phoneNumber"], phone.as_str());
    }

    assert_eq!(adapter.sends(), 10);
    let sent = adapter.sent.lock().await;
    for i in 0..10_u32 {
        let jid = format!("1555000000{i}@c.us");
        let text = format!("msg {i}");
        assert!(sent.contains(&(jid, text)));
    }
}
