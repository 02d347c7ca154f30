// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{test_account, CHILD_A1, MAIN_A};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use syncrs::domain::models::rate_limit::RateLimitSnapshot;
use syncrs::domain::services::rate_limit_tracker::RateLimitTracker;
use syncrs::domain::services::remote_api::{RemoteApiClient, RemoteError};
use syncrs::infrastructure::cache::rate_limit_tracker::InMemoryRateLimitTracker;
use syncrs::infrastructure::remote::http_client::HttpRemoteClient;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, tracker: Arc<InMemoryRateLimitTracker>) -> HttpRemoteClient {
    HttpRemoteClient::new(
        &server.uri(),
        Duration::from_secs(5),
        tracker,
        Duration::from_secs(60),
    )
    .unwrap()
}

fn tracker() -> Arc<InMemoryRateLimitTracker> {
    Arc::new(InMemoryRateLimitTracker::new(Duration::from_secs(120)))
}

/// 测试成功响应被解析，限流头按主账号记录
#[tokio::test]
async fn test_success_records_snapshot_under_main_account() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .and(header("authorization", "Bearer token-11"))
        .and(body_json(json!({"title": "Shirt"})))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-ratelimit-remaining", "37")
                .insert_header("x-ratelimit-limit", "40")
                .insert_header("x-ratelimit-reset", "20")
                .set_body_json(json!({"id": 987})),
        )
        .mount(&server)
        .await;

    let tracker = tracker();
    let client = client(&server, tracker.clone());
    let account = test_account(CHILD_A1, Some(MAIN_A));

    let response = client
        .post(&account, "/products", &json!({"title": "Shirt"}))
        .await
        .unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.id().as_deref(), Some("987"));

    let snapshot = tracker.get(MAIN_A).await.unwrap();
    assert_eq!(snapshot.remaining, 37);
    assert_eq!(snapshot.limit, 40);
    let reset_in = snapshot.reset_timestamp - Utc::now().timestamp();
    assert!((18..=20).contains(&reset_in));
    assert!(tracker.get(CHILD_A1).await.is_none());
}

/// 测试 GET 参数转为查询串，空响应体解析为 null
#[tokio::test]
async fn test_get_sends_query_and_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("status", "open"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server, tracker());
    let response = client
        .get(
            &test_account(MAIN_A, None),
            "orders",
            &json!({"status": "open", "limit": 5, "cursor": null}),
        )
        .await
        .unwrap();
    assert_eq!(response.data, serde_json::Value::Null);
}

/// 测试 429 响应转为限流信号并带上 Retry-After
#[tokio::test]
async fn test_too_many_requests_becomes_rate_limit_signal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "42")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-limit", "40"),
        )
        .mount(&server)
        .await;

    let client = client(&server, tracker());
    let result = client
        .post(&test_account(CHILD_A1, Some(MAIN_A)), "/products", &json!({}))
        .await;

    match result {
        Err(RemoteError::RateLimited(signal)) => {
            assert_eq!(signal.retry_after, Duration::from_secs(42));
            assert_eq!(signal.endpoint, "/products");
            assert_eq!(signal.snapshot.unwrap().remaining, 0);
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

/// 测试 429 没有任何提示时使用默认等待时间
#[tokio::test]
async fn test_too_many_requests_without_hints_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/variants/1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = client(&server, tracker());
    let result = client
        .get(&test_account(MAIN_A, None), "/variants/1", &json!({}))
        .await;

    match result {
        Err(RemoteError::RateLimited(signal)) => {
            assert_eq!(signal.retry_after, Duration::from_secs(60));
            assert!(signal.snapshot.is_none());
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

/// 测试配额已耗尽时不发请求
#[tokio::test]
async fn test_exhausted_quota_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = tracker();
    tracker
        .record(
            MAIN_A,
            RateLimitSnapshot::new(0, 40, Utc::now().timestamp() + 25),
        )
        .await;
    let client = client(&server, tracker);

    let result = client
        .post(&test_account(CHILD_A1, Some(MAIN_A)), "/products", &json!({}))
        .await;
    match result {
        Err(RemoteError::RateLimited(signal)) => {
            assert!(signal.retry_after <= Duration::from_secs(25));
            assert!(signal.retry_after >= Duration::from_secs(23));
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// 测试非 2xx 响应返回状态码和截断后的响应体
#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products/55"))
        .respond_with(ResponseTemplate::new(422).set_body_string("x".repeat(800)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client(&server, tracker());
    let account = test_account(MAIN_A, None);

    match client.post(&account, "/products/55", &json!({})).await {
        Err(RemoteError::Http { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message.len(), 500);
        }
        other => panic!("expected http error, got {:?}", other),
    }

    assert!(matches!(
        client.get(&account, "/products/broken", &json!({})).await,
        Err(RemoteError::InvalidResponse(_))
    ));
}

/// 测试连接失败归为网络错误
#[tokio::test]
async fn test_connection_failure_is_network_error() {
    let client = HttpRemoteClient::new(
        "http://127.0.0.1:9",
        Duration::from_secs(2),
        tracker(),
        Duration::from_secs(60),
    )
    .unwrap();

    let result = client
        .get(&test_account(MAIN_A, None), "/products", &json!({}))
        .await;
    assert!(matches!(result, Err(RemoteError::Network(_))));
}
