// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{TestEngine, CHILD_A1, CHILD_A2, CHILD_B1, MAIN_A, MAIN_B};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use sea_orm::EntityTrait;
use serde_json::json;
use std::time::Duration;
use syncrs::domain::models::entity_mapping::MappingKey;
use syncrs::domain::models::rate_limit::{RateLimitSignal, RateLimitSnapshot};
use syncrs::domain::models::sync_task::{EntityType, NewSyncTask, SyncOperation, TaskStatus};
use syncrs::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use syncrs::domain::services::remote_api::{RemoteError, RemoteResponse};
use syncrs::infrastructure::database::entities::sync_statistic;
use syncrs::utils::time;

fn rate_limited(remaining: i64, retry_after_secs: u64) -> Result<RemoteResponse, RemoteError> {
    let snapshot = RateLimitSnapshot::new(
        remaining,
        40,
        Utc::now().timestamp() + retry_after_secs as i64,
    );
    Err(RemoteError::RateLimited(RateLimitSignal::new(
        Duration::from_secs(retry_after_secs),
        Some(snapshot),
        "/products",
    )))
}

fn http_error(status: u16) -> Result<RemoteResponse, RemoteError> {
    Err(RemoteError::Http {
        status,
        message: format!("status {}", status),
    })
}

/// 计划时间是否落在 `now + secs` 附近
fn scheduled_around(at: Option<DateTime<FixedOffset>>, secs: i64) -> bool {
    let Some(at) = at else {
        return false;
    };
    let delta = at - time::now();
    delta > ChronoDuration::seconds(secs - 5) && delta <= ChronoDuration::seconds(secs + 1)
}

/// 测试主账号全局耗尽：该主账号的任务全部推迟，其它主账号不受影响
#[tokio::test]
async fn test_global_exhaustion_defers_main_account_only() {
    let engine = TestEngine::with_batch_size(5).await;

    let mut m = Vec::new();
    for i in 1..=4 {
        m.push(
            engine
                .enqueue(CHILD_A1, MAIN_A, EntityType::Product, &format!("m-{}", i), SyncOperation::Create)
                .await,
        );
    }
    let n1 = engine
        .enqueue(CHILD_B1, MAIN_B, EntityType::Product, "n-1", SyncOperation::Create)
        .await;
    let n2 = engine
        .enqueue(CHILD_B1, MAIN_B, EntityType::Product, "n-2", SyncOperation::Create)
        .await;

    engine
        .remote
        .on_account("POST", "/products", CHILD_A1, rate_limited(0, 30));

    let report = engine.worker.process_batch().await.unwrap();

    // 领取顺序：m1, n1, m2, n2, m3；m4 未被领取
    assert_eq!(report.claimed, 5);
    assert_eq!(report.completed, 2);
    assert_eq!(report.rescheduled, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.postponed, 1);

    // 只有第一个任务真正调用了远端
    let main_a_calls: Vec<_> = engine
        .remote
        .calls_to("POST", "/products")
        .into_iter()
        .filter(|c| c.account_id == CHILD_A1)
        .collect();
    assert_eq!(main_a_calls.len(), 1);

    for task in &m {
        let stored = engine.task(task.id).await;
        assert_eq!(stored.status, TaskStatus::Pending, "task {}", task.id);
        assert_eq!(stored.attempts, 0, "task {}", task.id);
        assert!(scheduled_around(stored.scheduled_at, 30), "task {}", task.id);
    }
    let first = engine.task(m[0].id).await;
    assert_eq!(first.rate_limit_info.as_ref().unwrap()["remaining"], json!(0));

    assert_eq!(engine.task(n1.id).await.status, TaskStatus::Completed);
    assert_eq!(engine.task(n2.id).await.status, TaskStatus::Completed);

    // 推迟期间不会被再次领取
    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.claimed, 0);
}

/// 测试接口级限流只重新排期当前任务
#[tokio::test]
async fn test_endpoint_rate_limit_reschedules_current_task_only() {
    let engine = TestEngine::new().await;
    let t1 = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    let t2 = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-2", SyncOperation::Create)
        .await;
    let t3 = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-3", SyncOperation::Create)
        .await;

    engine.remote.once("POST", "/products", rate_limited(10, 20));

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.rescheduled, 1);
    assert_eq!(report.completed, 2);
    assert_eq!(report.postponed, 0);

    let first = engine.task(t1.id).await;
    assert_eq!(first.status, TaskStatus::Pending);
    assert_eq!(first.attempts, 0);
    assert!(scheduled_around(first.scheduled_at, 20));
    assert_eq!(engine.task(t2.id).await.status, TaskStatus::Completed);
    assert_eq!(engine.task(t3.id).await.status, TaskStatus::Completed);
}

/// 测试 4xx 错误是永久性的，一次即失败
#[tokio::test]
async fn test_client_error_fails_immediately() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    engine.remote.once("POST", "/products", http_error(422));

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = engine.task(task.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.error.unwrap().contains("422"));
    assert!(stored.completed_at.is_some());
}

/// 测试 5xx 错误按退避重试，尝试次数耗尽后失败
#[tokio::test]
async fn test_server_error_retries_with_backoff() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    engine.remote.once("POST", "/products", http_error(503));

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.rescheduled, 1);

    let stored = engine.task(task.id).await;
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.attempts, 1);
    assert!(scheduled_around(stored.scheduled_at, 5 * 60));
    assert!(stored.error.unwrap().contains("503"));

    let single_shot = engine
        .queue
        .enqueue(
            NewSyncTask::new(
                CHILD_B1,
                EntityType::Product,
                "n-1",
                SyncOperation::Create,
                json!({"main_account_id": MAIN_B, "data": {}}),
            )
            .with_max_attempts(1),
        )
        .await
        .unwrap();
    engine.remote.once("POST", "/products", http_error(500));

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.failed, 1);
    let stored = engine.task(single_shot.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 1);
}

/// 测试持续的 5xx 错误：第 N 次失败后等待 5×N 分钟，用尽尝试次数后失败
#[tokio::test]
async fn test_server_error_backoff_grows_until_attempts_exhausted() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    assert_eq!(task.max_attempts, 3);
    engine.remote.on("POST", "/products", http_error(502));

    for (attempt, minutes) in [(1, 5), (2, 10)] {
        let report = engine.worker.process_batch().await.unwrap();
        assert_eq!(report.rescheduled, 1);

        let stored = engine.task(task.id).await;
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(stored.attempts, attempt);
        assert!(scheduled_around(stored.scheduled_at, minutes * 60));

        // 等待期内不会被领取
        assert_eq!(engine.worker.process_batch().await.unwrap().claimed, 0);
        engine.make_due(task.id).await;
    }

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.failed, 1);
    let stored = engine.task(task.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(engine.remote.calls_to("POST", "/products").len(), 3);
}

/// 测试没有处理器的实体类型直接失败，不调用远端
#[tokio::test]
async fn test_unknown_entity_type_fails() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(
            CHILD_A1,
            MAIN_A,
            EntityType::Other("gift_card".to_string()),
            "g-1",
            SyncOperation::Create,
        )
        .await;

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = engine.task(task.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.error.unwrap().contains("gift_card"));
    assert!(engine.remote.calls().is_empty());
}

/// 测试子账号关闭了订单同步时任务被跳过并完成
#[tokio::test]
async fn test_disabled_category_is_skipped() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(CHILD_A2, MAIN_A, EntityType::Order, "o-1", SyncOperation::Create)
        .await;

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(engine.task(task.id).await.status, TaskStatus::Completed);
    assert!(engine.remote.calls().is_empty());
}

/// 测试创建后保存映射，后续更新走子账号实体ID
#[tokio::test]
async fn test_create_then_update_uses_mapping() {
    let engine = TestEngine::new().await;
    engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    engine.worker.process_batch().await.unwrap();

    let key = MappingKey::new(MAIN_A, CHILD_A1, EntityType::Product, "p-1");
    let mapping = engine.mappings.find(&key).await.unwrap().unwrap();
    assert_eq!(mapping.child_entity_id, "remote-1");

    let update = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Update)
        .await;
    engine.worker.process_batch().await.unwrap();

    assert_eq!(engine.task(update.id).await.status, TaskStatus::Completed);
    assert_eq!(engine.remote.calls_to("POST", "/products/remote-1").len(), 1);
    assert_eq!(engine.remote.calls_to("POST", "/products").len(), 1);
}

/// 测试更新时子账号实体已被删除，删除映射并重新创建
#[tokio::test]
async fn test_update_of_missing_entity_recreates() {
    let engine = TestEngine::new().await;
    engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    engine.worker.process_batch().await.unwrap();

    engine.remote.once("POST", "/products/remote-1", http_error(404));
    let update = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Update)
        .await;
    engine.worker.process_batch().await.unwrap();

    assert_eq!(engine.task(update.id).await.status, TaskStatus::Completed);
    let key = MappingKey::new(MAIN_A, CHILD_A1, EntityType::Product, "p-1");
    let mapping = engine.mappings.find(&key).await.unwrap().unwrap();
    assert_eq!(mapping.child_entity_id, "remote-2");
    assert_eq!(engine.remote.calls_to("POST", "/products").len(), 2);
}

/// 测试没有映射的归档被跳过
#[tokio::test]
async fn test_archive_without_mapping_is_skipped() {
    let engine = TestEngine::new().await;
    let task = engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Archive)
        .await;

    engine.worker.process_batch().await.unwrap();
    assert_eq!(engine.task(task.id).await.status, TaskStatus::Completed);
    assert!(engine.remote.calls().is_empty());
}

/// 测试只有真实的状态转换才写入统计
#[tokio::test]
async fn test_statistics_recorded_per_terminal_transition() {
    let engine = TestEngine::new().await;
    engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Product, "p-1", SyncOperation::Create)
        .await;
    engine
        .enqueue(CHILD_B1, MAIN_B, EntityType::Order, "o-1", SyncOperation::Create)
        .await;
    engine
        .enqueue(CHILD_A1, MAIN_A, EntityType::Variant, "v-1", SyncOperation::Create)
        .await;
    engine.remote.once("POST", "/variants", http_error(400));
    engine.remote.once("POST", "/orders", rate_limited(5, 10));

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.rescheduled, 1);

    let rows = sync_statistic::Entity::find().all(engine.db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|r| r.success).count(), 1);
    assert!(rows
        .iter()
        .all(|r| r.category == "catalog" && r.main_account_id == Some(MAIN_A)));
}

/// 测试空队列时一轮处理返回空报告
#[tokio::test]
async fn test_run_cycle_on_empty_queue() {
    let engine = TestEngine::new().await;
    let report = engine.worker.run_cycle().await.unwrap();
    assert_eq!(report.claimed, 0);
}
