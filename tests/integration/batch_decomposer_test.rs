// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{test_account, TestEngine, CHILD_A1, MAIN_A};
use chrono::Duration as ChronoDuration;
use serde_json::{json, Value};
use std::time::Duration;
use syncrs::domain::models::entity_mapping::MappingKey;
use syncrs::domain::models::rate_limit::RateLimitSignal;
use syncrs::domain::models::sync_task::{EntityType, NewSyncTask, SyncOperation, SyncTask, TaskStatus};
use syncrs::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use syncrs::domain::repositories::sync_task_repository::FailureDetails;
use syncrs::domain::services::remote_api::{RemoteError, RemoteResponse};
use syncrs::utils::time;

fn product_key(entity_id: &str) -> MappingKey {
    MappingKey::new(MAIN_A, CHILD_A1, EntityType::Product, entity_id)
}

async fn enqueue_batch(engine: &TestEngine, entities: Value) -> SyncTask {
    engine
        .queue
        .enqueue(NewSyncTask::new(
            CHILD_A1,
            EntityType::ProductBatch,
            "batch-1",
            SyncOperation::Create,
            json!({"main_account_id": MAIN_A, "entities": entities}),
        ))
        .await
        .unwrap()
}

fn five_products() -> Value {
    json!([
        {"id": "p1", "data": {"title": "one"}},
        {"id": "p2", "data": {"title": "two"}},
        {"id": "p3", "data": {"title": "three"}},
        {"id": "p4", "data": {"title": "four"}},
        {"id": "p5", "data": {"title": "five"}},
    ])
}

/// 测试批量失败后按映射状态拆分为单实体任务
#[tokio::test]
async fn test_failed_batch_is_decomposed() {
    let engine = TestEngine::new().await;
    for (source, child) in [("p1", "c1"), ("p2", "c2"), ("p3", "c3"), ("p4", "c4")] {
        engine.mappings.save(&product_key(source), child).await.unwrap();
    }
    engine.remote.on(
        "GET",
        "/products/c3",
        Ok(RemoteResponse::new(200, json!({"id": "c3", "archived": true}))),
    );
    engine.remote.on(
        "GET",
        "/products/c4",
        Err(RemoteError::Http {
            status: 404,
            message: "not found".to_string(),
        }),
    );
    engine.remote.on(
        "POST",
        "/products/batch",
        Err(RemoteError::Http {
            status: 500,
            message: "internal error".to_string(),
        }),
    );

    let batch = enqueue_batch(&engine, five_products()).await;
    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.decomposed, 1);

    let original = engine.task(batch.id).await;
    assert_eq!(original.status, TaskStatus::Failed);
    assert_eq!(original.attempts, 1);
    assert!(original.error.unwrap().contains("decomposed into 3 tasks"));

    // 新任务按顺序创建：p3、p4、p5
    let mut created = Vec::new();
    for id in batch.id + 1..=batch.id + 3 {
        created.push(engine.task(id).await);
    }
    let entity_ids: Vec<&str> = created.iter().map(|t| t.entity_id.as_str()).collect();
    assert_eq!(entity_ids, vec!["p3", "p4", "p5"]);

    let min_delay = time::now() + ChronoDuration::seconds(50);
    for task in &created {
        assert_eq!(task.entity_type, EntityType::Product);
        assert_eq!(task.operation, SyncOperation::Create);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.main_account_id, Some(MAIN_A));
        assert_eq!(task.payload["original_batch_task_id"], json!(batch.id));
        assert!(task.payload["failure_reason"].as_str().unwrap().contains("500"));
        assert!(task.scheduled_at.unwrap() > min_delay);
    }
    assert_eq!(created[0].payload["data"], json!({"title": "three"}));
    assert!(engine.queue.find(batch.id + 4).await.unwrap().is_none());

    // 有效映射保留，失效映射删除
    assert!(engine.mappings.find(&product_key("p1")).await.unwrap().is_some());
    assert!(engine.mappings.find(&product_key("p2")).await.unwrap().is_some());
    assert!(engine.mappings.find(&product_key("p3")).await.unwrap().is_none());
    assert!(engine.mappings.find(&product_key("p4")).await.unwrap().is_none());
}

/// 测试批量调用成功时保存返回的映射
#[tokio::test]
async fn test_successful_batch_saves_mappings() {
    let engine = TestEngine::new().await;
    engine.mappings.save(&product_key("p1"), "c1").await.unwrap();
    engine.remote.on(
        "POST",
        "/products/batch",
        Ok(RemoteResponse::new(
            200,
            json!({"items": [
                {"source_id": "p1", "id": "c1"},
                {"source_id": "p2", "id": "c2"},
            ]}),
        )),
    );

    let batch = enqueue_batch(
        &engine,
        json!([{"id": "p1", "data": {}}, {"id": "p2", "data": {}}]),
    )
    .await;
    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(engine.task(batch.id).await.status, TaskStatus::Completed);

    let calls = engine.remote.calls_to("POST", "/products/batch");
    assert_eq!(calls.len(), 1);
    let items = calls[0].params["items"].as_array().unwrap();
    assert_eq!(items[0]["id"], json!("c1"));
    assert!(items[1].get("id").is_none());

    let mapping = engine.mappings.find(&product_key("p2")).await.unwrap().unwrap();
    assert_eq!(mapping.child_entity_id, "c2");
}

/// 测试批量任务被限流时不分解，只重新排期
#[tokio::test]
async fn test_rate_limited_batch_is_not_decomposed() {
    let engine = TestEngine::new().await;
    engine.remote.on(
        "POST",
        "/products/batch",
        Err(RemoteError::RateLimited(RateLimitSignal::new(
            Duration::from_secs(15),
            None,
            "/products/batch",
        ))),
    );

    let batch = enqueue_batch(&engine, five_products()).await;
    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.decomposed, 0);
    assert_eq!(report.rescheduled, 1);

    let stored = engine.task(batch.id).await;
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.attempts, 0);
    assert!(engine.queue.find(batch.id + 1).await.unwrap().is_none());
}

/// 测试没有实体列表的批量任务直接失败
#[tokio::test]
async fn test_batch_without_entities_fails() {
    let engine = TestEngine::new().await;
    let batch = engine
        .queue
        .enqueue(NewSyncTask::new(
            CHILD_A1,
            EntityType::ProductBatch,
            "batch-empty",
            SyncOperation::Create,
            json!({"main_account_id": MAIN_A}),
        ))
        .await
        .unwrap();

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.decomposed, 1);

    let stored = engine.task(batch.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.error.unwrap().contains("unrecoverable"));
    assert!(engine.remote.calls().is_empty());
}

/// 测试子账号未加载时批量任务直接失败，映射保持不变
#[tokio::test]
async fn test_batch_for_unknown_account_keeps_mappings() {
    let engine = TestEngine::new().await;
    let unknown_child = 99;
    let key = MappingKey::new(MAIN_A, unknown_child, EntityType::Product, "p1");
    engine.mappings.save(&key, "c1").await.unwrap();

    let batch = engine
        .queue
        .enqueue(NewSyncTask::new(
            unknown_child,
            EntityType::ProductBatch,
            "batch-orphan",
            SyncOperation::Create,
            json!({"main_account_id": MAIN_A, "entities": [{"id": "p1", "data": {}}]}),
        ))
        .await
        .unwrap();

    let report = engine.worker.process_batch().await.unwrap();
    assert_eq!(report.decomposed, 0);
    assert_eq!(report.failed, 1);

    let stored = engine.task(batch.id).await;
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.error.unwrap().contains("99"));
    assert!(engine.queue.find(batch.id + 1).await.unwrap().is_none());
    assert!(engine.remote.calls().is_empty());

    let mapping = engine.mappings.find(&key).await.unwrap().unwrap();
    assert_eq!(mapping.child_entity_id, "c1");
}

/// 测试分解只在任务仍处于 processing 时写入新任务
#[tokio::test]
async fn test_decomposition_is_discarded_when_task_already_finalized() {
    let engine = TestEngine::new().await;
    let batch = enqueue_batch(&engine, five_products()).await;
    let claimed = engine.queue.claim(10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    // 另一个实例已经把任务收尾
    assert!(engine
        .queue
        .fail(batch.id, FailureDetails::error("finalized elsewhere"))
        .await
        .unwrap());

    let account = test_account(CHILD_A1, Some(MAIN_A));
    let outcome = engine
        .decomposer
        .decompose(&claimed[0], &account, "HTTP 500", 1, 10)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(engine.queue.find(batch.id + 1).await.unwrap().is_none());

    let stored = engine.task(batch.id).await;
    assert_eq!(stored.error.as_deref(), Some("finalized elsewhere"));
}
