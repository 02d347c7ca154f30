// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{setup_db, CHILD_A1, CHILD_B1, MAIN_A, MAIN_B};
use chrono::Duration as ChronoDuration;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use syncrs::domain::models::sync_task::{EntityType, NewSyncTask, SyncOperation, TaskStatus};
use syncrs::domain::repositories::sync_task_repository::{FailureDetails, SyncTaskRepository};
use syncrs::infrastructure::database::entities::sync_task;
use syncrs::infrastructure::repositories::sync_task_repo_impl::SyncTaskRepositoryImpl;
use syncrs::queue::task_queue::{PostgresSyncQueue, QueueError, SyncQueue};
use syncrs::utils::time;

fn product_task(account_id: i64, main_account_id: i64, entity_id: &str) -> NewSyncTask {
    NewSyncTask::new(
        account_id,
        EntityType::Product,
        entity_id,
        SyncOperation::Create,
        json!({"main_account_id": main_account_id, "data": {"title": entity_id}}),
    )
}

async fn queue() -> (Arc<SyncTaskRepositoryImpl>, PostgresSyncQueue<SyncTaskRepositoryImpl>) {
    let db = setup_db().await;
    let repo = Arc::new(SyncTaskRepositoryImpl::new(db));
    let queue = PostgresSyncQueue::new(repo.clone(), Duration::from_secs(15 * 60));
    (repo, queue)
}

/// 测试入队必须带有主账号ID
#[tokio::test]
async fn test_enqueue_requires_main_account_id() {
    let (_, queue) = queue().await;

    let task = NewSyncTask::new(
        CHILD_A1,
        EntityType::Product,
        "p-1",
        SyncOperation::Create,
        json!({"data": {}}),
    );
    let result = queue.enqueue(task).await;
    assert!(matches!(result, Err(QueueError::InvalidPayload(_))));

    let task = queue.enqueue(product_task(CHILD_A1, MAIN_A, "p-1")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.main_account_id, Some(MAIN_A));
    assert_eq!(task.attempts, 0);
}

/// 测试领取顺序：优先级、公平序号、计划时间
#[tokio::test]
async fn test_claim_orders_by_priority_then_fairness() {
    let (_, queue) = queue().await;

    let a1 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-1")).await.unwrap();
    let a2 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-2")).await.unwrap();
    let a3 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-3")).await.unwrap();
    let b1 = queue.enqueue(product_task(CHILD_B1, MAIN_B, "b-1")).await.unwrap();
    let b2 = queue.enqueue(product_task(CHILD_B1, MAIN_B, "b-2")).await.unwrap();
    let urgent = queue
        .enqueue(product_task(CHILD_B1, MAIN_B, "b-urgent").with_priority(10))
        .await
        .unwrap();

    assert_eq!((a1.fairness_seq, a2.fairness_seq, a3.fairness_seq), (0, 1, 2));
    assert_eq!((b1.fairness_seq, b2.fairness_seq), (0, 1));

    let claimed = queue.claim(50).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![urgent.id, a1.id, b1.id, a2.id, b2.id, a3.id]);
    assert!(claimed
        .iter()
        .all(|t| t.status == TaskStatus::Processing && t.started_at.is_some()));

    // 已领取的任务不会再次被领取
    assert!(queue.claim(50).await.unwrap().is_empty());
}

/// 测试同一主账号的新任务不会越过仍在等待的旧任务
#[tokio::test]
async fn test_fresh_tasks_never_overtake_older_siblings() {
    let (_, queue) = queue().await;

    let c0 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "c-0")).await.unwrap();
    let c1 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "c-1")).await.unwrap();
    let c2 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "c-2")).await.unwrap();

    for task in queue.claim(2).await.unwrap() {
        assert!(queue.complete(task.id).await.unwrap());
    }
    assert_eq!(queue.find(c0.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    assert_eq!(queue.find(c1.id).await.unwrap().unwrap().status, TaskStatus::Completed);

    let mut expected = c2.id;
    let mut last_seq = c2.fairness_seq;
    for i in 0..5 {
        let fresh = queue
            .enqueue(product_task(CHILD_A1, MAIN_A, &format!("fresh-{}", i)))
            .await
            .unwrap();
        assert!(fresh.fairness_seq > last_seq);
        last_seq = fresh.fairness_seq;

        let claimed = queue.claim(1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, expected, "cycle {}", i);
        assert!(queue.complete(claimed[0].id).await.unwrap());
        expected = fresh.id;
    }

    // 新出现的主账号与现有积压交错，而不是排到它前面
    let backlog = queue.find(expected).await.unwrap().unwrap();
    let newcomer = queue.enqueue(product_task(CHILD_B1, MAIN_B, "b-1")).await.unwrap();
    assert_eq!(newcomer.fairness_seq, backlog.fairness_seq);

    let ids: Vec<i64> = queue.claim(10).await.unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![backlog.id, newcomer.id]);
}

/// 测试未到期的任务不会被领取
#[tokio::test]
async fn test_claim_skips_future_tasks_and_respects_limit() {
    let (_, queue) = queue().await;

    let later = time::now() + ChronoDuration::minutes(10);
    queue
        .enqueue(product_task(CHILD_A1, MAIN_A, "future").scheduled_at(later))
        .await
        .unwrap();
    for i in 0..3 {
        queue
            .enqueue(product_task(CHILD_A1, MAIN_A, &format!("now-{}", i)))
            .await
            .unwrap();
    }

    let first = queue.claim(2).await.unwrap();
    assert_eq!(first.len(), 2);
    let second = queue.claim(2).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].entity_id, "now-2");
    assert!(queue.claim(2).await.unwrap().is_empty());
}

/// 测试卡在 processing 超过时间窗口的任务可被重新领取
#[tokio::test]
async fn test_stuck_tasks_are_reclaimed() {
    let (repo, queue) = queue().await;
    let task = queue.enqueue(product_task(CHILD_A1, MAIN_A, "stuck")).await.unwrap();

    let claimed_at = time::now() - ChronoDuration::minutes(30);
    let claimed = repo
        .claim_batch(10, claimed_at, claimed_at - ChronoDuration::minutes(15))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    let reclaimed = queue.claim(10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, task.id);
    assert_eq!(reclaimed[0].status, TaskStatus::Processing);
}

/// 测试并发领取不会返回重叠的任务
#[tokio::test]
async fn test_concurrent_claims_do_not_overlap() {
    let (_, queue) = queue().await;
    let queue = Arc::new(queue);
    for i in 0..20 {
        queue
            .enqueue(product_task(CHILD_A1, MAIN_A, &format!("p-{}", i)))
            .await
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim(7).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap().into_iter().map(|t| t.id));
    }
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(total, 20);
}

/// 测试完成是幂等的：重复完成返回 false
#[tokio::test]
async fn test_complete_is_idempotent() {
    let (_, queue) = queue().await;
    let task = queue.enqueue(product_task(CHILD_A1, MAIN_A, "p-1")).await.unwrap();

    // pending 状态不能直接完成
    assert!(!queue.complete(task.id).await.unwrap());

    queue.claim(1).await.unwrap();
    assert!(queue.complete(task.id).await.unwrap());
    assert!(!queue.complete(task.id).await.unwrap());

    let stored = queue.find(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert!(stored.completed_at.is_some());
}

/// 测试重新排期保留尝试次数与诊断信息
#[tokio::test]
async fn test_reschedule_sets_delay_and_details() {
    let (_, queue) = queue().await;
    let task = queue.enqueue(product_task(CHILD_A1, MAIN_A, "p-1")).await.unwrap();
    queue.claim(1).await.unwrap();

    let before = time::now();
    queue
        .reschedule(
            task.id,
            Duration::from_secs(120),
            FailureDetails::error("rate limited").with_rate_limit_info(json!({"remaining": 0})),
        )
        .await
        .unwrap();

    let stored = queue.find(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.attempts, 0);
    assert_eq!(stored.error.as_deref(), Some("rate limited"));
    assert_eq!(stored.rate_limit_info, Some(json!({"remaining": 0})));
    let delay = stored.scheduled_at.unwrap() - before;
    assert!(delay >= ChronoDuration::seconds(119) && delay <= ChronoDuration::seconds(125));
    assert!(stored.started_at.is_none());

    // 不在 processing 的任务不能重新排期
    let again = queue
        .reschedule(task.id, Duration::from_secs(1), FailureDetails::default())
        .await;
    assert!(again.is_err());
}

/// 测试批量推迟只影响该主账号的 pending 任务
#[tokio::test]
async fn test_postpone_all_for_main_account() {
    let (_, queue) = queue().await;
    let a1 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-1")).await.unwrap();
    let a2 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-2")).await.unwrap();
    let a3 = queue.enqueue(product_task(CHILD_A1, MAIN_A, "a-3")).await.unwrap();
    let b1 = queue.enqueue(product_task(CHILD_B1, MAIN_B, "b-1")).await.unwrap();

    let postponed = queue
        .postpone_all_for_main_account(MAIN_A, Duration::from_secs(600), Some(a1.id))
        .await
        .unwrap();
    assert_eq!(postponed, 2);

    assert!(queue.find(a1.id).await.unwrap().unwrap().scheduled_at.is_none());
    assert!(queue.find(a2.id).await.unwrap().unwrap().scheduled_at.is_some());
    assert!(queue.find(a3.id).await.unwrap().unwrap().scheduled_at.is_some());
    assert!(queue.find(b1.id).await.unwrap().unwrap().scheduled_at.is_none());

    let claimed = queue.claim(10).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a1.id, b1.id]);
}

/// 测试手动重试只接受 failed 任务
#[tokio::test]
async fn test_retry_resets_failed_task() {
    let (_, queue) = queue().await;
    let task = queue.enqueue(product_task(CHILD_A1, MAIN_A, "p-1")).await.unwrap();

    assert!(matches!(
        queue.retry(task.id).await,
        Err(QueueError::InvalidState { .. })
    ));
    assert!(matches!(queue.retry(9999).await, Err(QueueError::NotFound(9999))));

    queue.claim(1).await.unwrap();
    assert!(queue
        .fail(task.id, FailureDetails::error("HTTP 422").with_attempts(1))
        .await
        .unwrap());

    let retried = queue.retry(task.id).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);
    assert_eq!(retried.attempts, 0);
    assert!(retried.error.is_none());
    assert_eq!(queue.claim(1).await.unwrap().len(), 1);
}

/// 测试存储中无法识别的操作不会被当作 create 执行
#[tokio::test]
async fn test_corrupted_operation_is_rejected() {
    let db = setup_db().await;
    let repo = Arc::new(SyncTaskRepositoryImpl::new(db.clone()));
    let queue = PostgresSyncQueue::new(repo, Duration::from_secs(15 * 60));

    let broken = queue.enqueue(product_task(CHILD_A1, MAIN_A, "broken")).await.unwrap();
    let healthy = queue.enqueue(product_task(CHILD_A1, MAIN_A, "healthy")).await.unwrap();
    sync_task::Entity::update_many()
        .col_expr(sync_task::Column::Operation, Expr::value("explode"))
        .filter(sync_task::Column::Id.eq(broken.id))
        .exec(db.as_ref())
        .await
        .unwrap();

    assert!(queue.find(broken.id).await.is_err());

    let claimed = queue.claim(10).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![healthy.id]);

    let row = sync_task::Entity::find_by_id(broken.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, TaskStatus::Failed.to_string());
    assert!(row.error.unwrap().contains("explode"));
    assert!(queue.claim(10).await.unwrap().is_empty());
}
