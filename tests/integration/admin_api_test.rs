// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{seed_accounts, setup_db, FakeRemoteClient, RecordingNotifier, CHILD_A1, MAIN_A};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use syncrs::domain::models::webhook_health::HealthPolicy;
use syncrs::domain::repositories::sync_task_repository::FailureDetails;
use syncrs::domain::services::webhook_health_service::{WebhookHealthConfig, WebhookHealthMonitor};
use syncrs::infrastructure::repositories::account_repo_impl::AccountRepositoryImpl;
use syncrs::infrastructure::repositories::sync_task_repo_impl::SyncTaskRepositoryImpl;
use syncrs::infrastructure::repositories::webhook_health_repo_impl::WebhookHealthRepositoryImpl;
use syncrs::presentation::routes::{self, AppState};
use syncrs::queue::task_queue::{PostgresSyncQueue, SyncQueue};

async fn create_test_app() -> (TestServer, Arc<dyn SyncQueue>, Arc<FakeRemoteClient>) {
    let db = setup_db().await;
    seed_accounts(&db).await;

    let remote = FakeRemoteClient::new();
    let queue: Arc<dyn SyncQueue> = Arc::new(PostgresSyncQueue::new(
        Arc::new(SyncTaskRepositoryImpl::new(db.clone())),
        Duration::from_secs(900),
    ));
    let monitor = Arc::new(WebhookHealthMonitor::new(
        Arc::new(AccountRepositoryImpl::new(db.clone())),
        Arc::new(WebhookHealthRepositoryImpl::new(db.clone())),
        remote.clone(),
        Arc::new(RecordingNotifier::default()),
        WebhookHealthConfig {
            policy: HealthPolicy::default(),
            callback_url: "https://sync.example.com/webhooks".to_string(),
        },
    ));

    let state = AppState {
        queue: queue.clone(),
        monitor,
        default_max_attempts: 4,
        auto_heal: false,
    };
    let server = TestServer::new(routes::app(state)).unwrap();
    (server, queue, remote)
}

fn enqueue_body() -> Value {
    json!({
        "account_id": CHILD_A1,
        "entity_type": "product",
        "entity_id": "p-1",
        "operation": "create",
        "priority": 5,
        "payload": {"main_account_id": MAIN_A, "data": {"title": "Shirt"}}
    })
}

/// 测试健康检查和版本端点
#[tokio::test]
async fn test_public_endpoints() {
    let (server, _, _) = create_test_app().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");

    let response = server.get("/v1/version").await;
    response.assert_status_ok();
    response.assert_text(env!("CARGO_PKG_VERSION"));
}

/// 测试入队任务
#[tokio::test]
async fn test_enqueue_task() {
    let (server, _, _) = create_test_app().await;

    let response = server.post("/v1/tasks").json(&enqueue_body()).await;
    response.assert_status(StatusCode::CREATED);

    let task: Value = response.json();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["entity_type"], "product");
    assert_eq!(task["priority"], 5);
    assert_eq!(task["max_attempts"], 4);
    assert_eq!(task["main_account_id"], MAIN_A);

    let id = task["id"].as_i64().unwrap();
    let response = server.get(&format!("/v1/tasks/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["entity_id"], "p-1");
}

/// 测试入队请求校验
#[tokio::test]
async fn test_enqueue_validation() {
    let (server, _, _) = create_test_app().await;

    let mut body = enqueue_body();
    body["entity_id"] = json!("");
    let response = server.post("/v1/tasks").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let mut body = enqueue_body();
    body["payload"] = json!({"data": {}});
    let response = server.post("/v1/tasks").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("main_account_id"));
}

/// 测试查询不存在的任务
#[tokio::test]
async fn test_get_missing_task() {
    let (server, _, _) = create_test_app().await;

    let response = server.get("/v1/tasks/4242").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

/// 测试手动重试：只允许 failed 任务
#[tokio::test]
async fn test_retry_task() {
    let (server, queue, _) = create_test_app().await;

    let response = server.post("/v1/tasks").json(&enqueue_body()).await;
    let id = response.json::<Value>()["id"].as_i64().unwrap();

    let response = server.post(&format!("/v1/tasks/{}/retry", id)).await;
    response.assert_status(StatusCode::CONFLICT);

    queue.claim(10).await.unwrap();
    queue
        .fail(id, FailureDetails::error("HTTP 422: bad").with_attempts(1))
        .await
        .unwrap();

    let response = server.post(&format!("/v1/tasks/{}/retry", id)).await;
    response.assert_status_ok();
    let task: Value = response.json();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["attempts"], 0);

    let response = server.post("/v1/tasks/4242/retry").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

/// 测试 webhook 健康报告端点
#[tokio::test]
async fn test_webhook_health_endpoints() {
    let (server, _, remote) = create_test_app().await;

    let response = server.get("/v1/webhooks/health").await;
    response.assert_status_ok();
    let reports: Value = response.json();
    assert_eq!(reports.as_array().unwrap().len(), 5);

    let response = server.get(&format!("/v1/webhooks/health/{}", CHILD_A1)).await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["status"], "critical");
    assert_eq!(report["missing"], json!(["orders/create", "orders/update"]));

    let response = server.get("/v1/webhooks/health/999").await;
    response.assert_status(StatusCode::NOT_FOUND);

    // 未开启自动修复时只检查不安装
    let response = server.post("/v1/webhooks/heal").await;
    response.assert_status_ok();
    let summary: Value = response.json();
    assert_eq!(summary["accounts_checked"], 5);
    assert_eq!(summary["critical"], 5);
    assert_eq!(summary["healed"], 0);
    assert!(remote.calls().is_empty());
}
