//! Integration tests for the HTTP delivery client.
//!
//! Each test binds a throwaway Axum endpoint on localhost, so no external
//! service is needed.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};

use subrelay_common::types::NotificationPayload;
use subrelay_notifier::{DeliveryClient, DeliveryError, HttpDeliveryClient};

async fn spawn_endpoint(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn cancelled_payload() -> NotificationPayload {
    NotificationPayload::SubscriptionCancelled {
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
        plan_name: "Pro".to_string(),
        cancel_date: Utc::now(),
    }
}

#[tokio::test]
async fn test_success_response_is_delivered() {
    let router = Router::new().route(
        "/",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["type"], "subscription_cancelled");
            assert_eq!(body["email"], "ada@example.com");
            assert_eq!(body["planName"], "Pro");
            assert!(body["cancelDate"].is_string());
            Json(json!({ "success": true }))
        }),
    );
    let addr = spawn_endpoint(router).await;

    let client = HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    client.deliver(&cancelled_payload()).await.unwrap();
}

#[tokio::test]
async fn test_unsuccessful_verdict_is_rejected() {
    let router = Router::new().route(
        "/",
        post(|| async { Json(json!({ "success": false, "message": "quota exceeded" })) }),
    );
    let addr = spawn_endpoint(router).await;

    let client = HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let err = client.deliver(&cancelled_payload()).await.unwrap_err();

    match err {
        DeliveryError::Rejected { status, message } => {
            assert_eq!(status, None);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_status_is_rejected() {
    let router = Router::new().route(
        "/",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let addr = spawn_endpoint(router).await;

    let client = HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let err = client.deliver(&cancelled_payload()).await.unwrap_err();

    match err {
        DeliveryError::Rejected { status, message } => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_bad_response() {
    let router = Router::new().route("/", post(|| async { "sent!" }));
    let addr = spawn_endpoint(router).await;

    let client = HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let err = client.deliver(&cancelled_payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::BadResponse(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let router = Router::new().route(
        "/",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "success": true }))
        }),
    );
    let addr = spawn_endpoint(router).await;

    let client =
        HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_millis(100)).unwrap();
    let err = client.deliver(&cancelled_payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpDeliveryClient::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
    let err = client.deliver(&cancelled_payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
}
