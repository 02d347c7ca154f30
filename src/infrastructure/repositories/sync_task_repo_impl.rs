// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::sync_task::{EntityType, NewSyncTask, SyncTask, TaskStatus};
use crate::domain::repositories::sync_task_repository::{
    FailureDetails, RepositoryError, SyncTaskRepository,
};
use crate::infrastructure::database::entities::sync_task as task_entity;
use crate::utils::time;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    NotSet, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, UpdateMany,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// 同步任务仓库实现
///
/// 基于SeaORM实现的队列存储。领取在一个短事务中完成：
/// `SELECT ... FOR UPDATE SKIP LOCKED` 选出到期任务并立即标记为 processing 后提交，
/// 远程调用期间不持有任何行锁。
#[derive(Clone)]
pub struct SyncTaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SyncTaskRepositoryImpl {
    /// 创建新的同步任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// 未结束（pending 或 processing）的任务
fn active_condition() -> Condition {
    Condition::any()
        .add(task_entity::Column::Status.eq(TaskStatus::Pending.to_string()))
        .add(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
}

/// 分配公平序号
///
/// 同一主账号内序号只增不减：新任务排在该账号所有未结束任务之后。
/// 新出现的主账号从当前未结束任务的最小序号起步，与已有积压交错，
/// 而不是凭历史上更小的序号插到所有积压之前。
async fn next_fairness_seq<C: ConnectionTrait>(
    conn: &C,
    main_account_id: Option<i64>,
) -> Result<i32, RepositoryError> {
    let floor: Option<i32> = task_entity::Entity::find()
        .select_only()
        .column_as(Expr::col(task_entity::Column::FairnessSeq).min(), "seq")
        .filter(active_condition())
        .into_tuple::<Option<i32>>()
        .one(conn)
        .await?
        .flatten();

    let Some(main_account_id) = main_account_id else {
        return Ok(floor.unwrap_or(0));
    };

    let latest: Option<i32> = task_entity::Entity::find()
        .select_only()
        .column_as(Expr::col(task_entity::Column::FairnessSeq).max(), "seq")
        .filter(active_condition())
        .filter(task_entity::Column::MainAccountId.eq(main_account_id))
        .into_tuple::<Option<i32>>()
        .one(conn)
        .await?
        .flatten();

    let next = latest.map(|seq| seq.saturating_add(1)).unwrap_or(0);
    Ok(next.max(floor.unwrap_or(0)))
}

async fn insert_task<C: ConnectionTrait>(
    conn: &C,
    task: &NewSyncTask,
) -> Result<SyncTask, RepositoryError> {
    let now = time::now();
    let main_account_id = task.main_account_id();
    let fairness_seq = next_fairness_seq(conn, main_account_id).await?;

    let model = task_entity::ActiveModel {
        id: NotSet,
        account_id: Set(task.account_id),
        main_account_id: Set(main_account_id),
        entity_type: Set(task.entity_type.to_string()),
        entity_id: Set(task.entity_id.clone()),
        operation: Set(task.operation.to_string()),
        priority: Set(task.priority),
        fairness_seq: Set(fairness_seq),
        status: Set(TaskStatus::Pending.to_string()),
        attempts: Set(0),
        max_attempts: Set(task.max_attempts),
        payload: Set(task.payload.clone()),
        error: Set(None),
        rate_limit_info: Set(None),
        scheduled_at: Set(task.scheduled_at),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = model.insert(conn).await?;
    SyncTask::try_from(result)
}

/// processing -> failed 的条件更新
fn failed_update(id: i64, details: FailureDetails) -> UpdateMany<task_entity::Entity> {
    let now = time::now();
    let update = task_entity::Entity::update_many()
        .col_expr(
            task_entity::Column::Status,
            Expr::value(TaskStatus::Failed.to_string()),
        )
        .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
        .col_expr(task_entity::Column::UpdatedAt, Expr::value(now));

    apply_failure_details(update, details)
        .filter(task_entity::Column::Id.eq(id))
        .filter(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
}

impl TryFrom<task_entity::Model> for SyncTask {
    type Error = RepositoryError;

    /// 存储的操作或状态无法识别时拒绝该行，不按默认值执行
    fn try_from(model: task_entity::Model) -> Result<Self, Self::Error> {
        let operation = model.operation.parse().map_err(|_| {
            warn!(
                "Sync task {} has unrecognized operation '{}'",
                model.id, model.operation
            );
            RepositoryError::Corrupted(format!(
                "task {} has unrecognized operation '{}'",
                model.id, model.operation
            ))
        })?;
        let status = model.status.parse().map_err(|_| {
            warn!(
                "Sync task {} has unrecognized status '{}'",
                model.id, model.status
            );
            RepositoryError::Corrupted(format!(
                "task {} has unrecognized status '{}'",
                model.id, model.status
            ))
        })?;

        Ok(Self {
            id: model.id,
            account_id: model.account_id,
            main_account_id: model.main_account_id,
            entity_type: EntityType::from(model.entity_type),
            entity_id: model.entity_id,
            operation,
            priority: model.priority,
            fairness_seq: model.fairness_seq,
            status,
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            payload: model.payload,
            error: model.error,
            rate_limit_info: model.rate_limit_info,
            scheduled_at: model.scheduled_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// 把失败诊断信息写入批量更新
fn apply_failure_details(
    update: UpdateMany<task_entity::Entity>,
    details: FailureDetails,
) -> UpdateMany<task_entity::Entity> {
    let mut update = update;
    if let Some(error) = details.error {
        update = update.col_expr(task_entity::Column::Error, Expr::value(Some(error)));
    }
    if let Some(info) = details.rate_limit_info {
        update = update.col_expr(
            task_entity::Column::RateLimitInfo,
            Expr::value(Some::<Value>(info)),
        );
    }
    if let Some(attempts) = details.attempts {
        update = update.col_expr(task_entity::Column::Attempts, Expr::value(attempts));
    }
    update
}

#[async_trait]
impl SyncTaskRepository for SyncTaskRepositoryImpl {
    async fn create(&self, task: &NewSyncTask) -> Result<SyncTask, RepositoryError> {
        insert_task(self.db.as_ref(), task).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SyncTask>, RepositoryError> {
        let task = task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        task.map(SyncTask::try_from).transpose()
    }

    async fn claim_batch(
        &self,
        limit: u64,
        now: DateTime<FixedOffset>,
        stuck_before: DateTime<FixedOffset>,
    ) -> Result<Vec<SyncTask>, RepositoryError> {
        let txn = self.db.begin().await?;

        let due = Condition::all()
            .add(task_entity::Column::Status.eq(TaskStatus::Pending.to_string()))
            .add(
                Condition::any()
                    .add(task_entity::Column::ScheduledAt.is_null())
                    .add(task_entity::Column::ScheduledAt.lte(now)),
            );
        // 上一轮超时后遗留在 processing 的任务
        let stuck = Condition::all()
            .add(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
            .add(task_entity::Column::StartedAt.lt(stuck_before));

        let models = task_entity::Entity::find()
            .filter(Condition::any().add(due).add(stuck))
            .order_by_desc(task_entity::Column::Priority)
            .order_by_asc(task_entity::Column::FairnessSeq)
            .order_by_asc(task_entity::Column::ScheduledAt)
            .order_by_asc(task_entity::Column::Id)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        let mut tasks = Vec::with_capacity(models.len());
        let mut corrupted = Vec::new();
        for model in models {
            let id = model.id;
            match SyncTask::try_from(model) {
                Ok(task) => tasks.push(task),
                Err(e) => corrupted.push((id, e.to_string())),
            }
        }

        // 无法解析的行直接失败，避免每轮都被重新领取
        for (id, error) in corrupted {
            task_entity::Entity::update_many()
                .col_expr(
                    task_entity::Column::Status,
                    Expr::value(TaskStatus::Failed.to_string()),
                )
                .col_expr(task_entity::Column::Error, Expr::value(Some(error)))
                .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
                .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
                .filter(task_entity::Column::Id.eq(id))
                .exec(&txn)
                .await?;
        }

        if tasks.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Processing.to_string()),
            )
            .col_expr(task_entity::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        Ok(tasks
            .into_iter()
            .map(|mut task| {
                task.status = TaskStatus::Processing;
                task.started_at = Some(now);
                task.updated_at = now;
                task
            })
            .collect())
    }

    async fn mark_completed(&self, id: i64) -> Result<bool, RepositoryError> {
        let now = time::now();
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Completed.to_string()),
            )
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(&self, id: i64, details: FailureDetails) -> Result<bool, RepositoryError> {
        let result = failed_update(id, details).exec(self.db.as_ref()).await?;
        Ok(result.rows_affected > 0)
    }

    async fn fail_with_followups(
        &self,
        id: i64,
        details: FailureDetails,
        followups: &[NewSyncTask],
    ) -> Result<Option<Vec<SyncTask>>, RepositoryError> {
        let txn = self.db.begin().await?;

        let result = failed_update(id, details).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let mut created = Vec::with_capacity(followups.len());
        for task in followups {
            created.push(insert_task(&txn, task).await?);
        }

        txn.commit().await?;
        Ok(Some(created))
    }

    async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<FixedOffset>,
        details: FailureDetails,
    ) -> Result<(), RepositoryError> {
        let now = time::now();
        let update = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .col_expr(task_entity::Column::ScheduledAt, Expr::value(Some(scheduled_at)))
            .col_expr(
                task_entity::Column::StartedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now));

        let result = apply_failure_details(update, details)
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn postpone_pending_for_main_account(
        &self,
        main_account_id: i64,
        scheduled_at: DateTime<FixedOffset>,
        exclude_task_id: Option<i64>,
    ) -> Result<u64, RepositoryError> {
        let mut update = task_entity::Entity::update_many()
            .col_expr(task_entity::Column::ScheduledAt, Expr::value(Some(scheduled_at)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(time::now()))
            .filter(task_entity::Column::MainAccountId.eq(main_account_id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Pending.to_string()))
            // 已经排在更晚时间的任务不提前
            .filter(
                Condition::any()
                    .add(task_entity::Column::ScheduledAt.is_null())
                    .add(task_entity::Column::ScheduledAt.lt(scheduled_at)),
            );

        if let Some(exclude) = exclude_task_id {
            update = update.filter(task_entity::Column::Id.ne(exclude));
        }

        let result = update.exec(self.db.as_ref()).await?;
        Ok(result.rows_affected)
    }

    async fn reset_failed(
        &self,
        id: i64,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<SyncTask>, RepositoryError> {
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .col_expr(task_entity::Column::Attempts, Expr::value(0))
            .col_expr(task_entity::Column::Error, Expr::value(Option::<String>::None))
            .col_expr(task_entity::Column::ScheduledAt, Expr::value(Some(now)))
            .col_expr(
                task_entity::Column::StartedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(
                task_entity::Column::CompletedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Failed.to_string()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}
