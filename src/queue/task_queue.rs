// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::sync_task::{NewSyncTask, SyncTask, TaskStatus};
use crate::domain::repositories::sync_task_repository::{
    FailureDetails, RepositoryError, SyncTaskRepository,
};
use crate::utils::time;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 任务不存在
    #[error("Task {0} not found")]
    NotFound(i64),

    /// 当前状态不允许该操作
    #[error("Task {id} is {status}, expected failed")]
    InvalidState { id: i64, status: TaskStatus },

    /// 负载不合法
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// 同步任务队列特质
#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// 入队任务，负载中必须带有 `main_account_id`
    async fn enqueue(&self, task: NewSyncTask) -> Result<SyncTask, QueueError>;

    /// 原子地领取最多 `limit` 个到期任务
    async fn claim(&self, limit: u64) -> Result<Vec<SyncTask>, QueueError>;

    /// 完成任务；任务已不在 processing 时返回 false
    async fn complete(&self, task_id: i64) -> Result<bool, QueueError>;

    /// 任务失败；任务已不在 processing 时返回 false
    async fn fail(&self, task_id: i64, details: FailureDetails) -> Result<bool, QueueError>;

    /// 放回队列，`delay` 之后才可再次领取
    async fn reschedule(
        &self,
        task_id: i64,
        delay: Duration,
        details: FailureDetails,
    ) -> Result<(), QueueError>;

    /// 推迟某主账号下所有 pending 任务，返回受影响的任务数
    async fn postpone_all_for_main_account(
        &self,
        main_account_id: i64,
        delay: Duration,
        exclude_task_id: Option<i64>,
    ) -> Result<u64, QueueError>;

    /// 手动重试：把 failed 任务重置为 pending
    async fn retry(&self, task_id: i64) -> Result<SyncTask, QueueError>;

    /// 查找任务
    async fn find(&self, task_id: i64) -> Result<Option<SyncTask>, QueueError>;
}

/// PostgreSQL同步任务队列实现
pub struct PostgresSyncQueue<R: SyncTaskRepository + ?Sized> {
    /// 任务仓库
    repository: Arc<R>,
    /// processing 超过该时长的任务可被重新领取
    stuck_timeout: Duration,
}

impl<R: SyncTaskRepository + ?Sized> PostgresSyncQueue<R> {
    /// 创建新的同步任务队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `stuck_timeout` - 卡住任务的回收时间窗口
    pub fn new(repository: Arc<R>, stuck_timeout: Duration) -> Self {
        Self {
            repository,
            stuck_timeout,
        }
    }
}

#[async_trait]
impl<R: SyncTaskRepository + ?Sized> SyncQueue for PostgresSyncQueue<R> {
    async fn enqueue(&self, task: NewSyncTask) -> Result<SyncTask, QueueError> {
        if task.main_account_id().is_none() {
            return Err(QueueError::InvalidPayload(
                "payload.main_account_id is required".to_string(),
            ));
        }
        let created = self.repository.create(&task).await?;
        Ok(created)
    }

    async fn claim(&self, limit: u64) -> Result<Vec<SyncTask>, QueueError> {
        let now = time::now();
        let stuck_before = now - time::to_chrono(self.stuck_timeout);
        let tasks = self.repository.claim_batch(limit, now, stuck_before).await?;
        Ok(tasks)
    }

    async fn complete(&self, task_id: i64) -> Result<bool, QueueError> {
        Ok(self.repository.mark_completed(task_id).await?)
    }

    async fn fail(&self, task_id: i64, details: FailureDetails) -> Result<bool, QueueError> {
        Ok(self.repository.mark_failed(task_id, details).await?)
    }

    async fn reschedule(
        &self,
        task_id: i64,
        delay: Duration,
        details: FailureDetails,
    ) -> Result<(), QueueError> {
        self.repository
            .reschedule(task_id, time::after(delay), details)
            .await?;
        Ok(())
    }

    async fn postpone_all_for_main_account(
        &self,
        main_account_id: i64,
        delay: Duration,
        exclude_task_id: Option<i64>,
    ) -> Result<u64, QueueError> {
        let count = self
            .repository
            .postpone_pending_for_main_account(main_account_id, time::after(delay), exclude_task_id)
            .await?;
        Ok(count)
    }

    async fn retry(&self, task_id: i64) -> Result<SyncTask, QueueError> {
        let task = self
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(QueueError::NotFound(task_id))?;

        if task.status != TaskStatus::Failed {
            return Err(QueueError::InvalidState {
                id: task_id,
                status: task.status,
            });
        }

        // 查询与重置之间状态可能已被改变
        self.repository
            .reset_failed(task_id, time::now())
            .await?
            .ok_or(QueueError::InvalidState {
                id: task_id,
                status: task.status,
            })
    }

    async fn find(&self, task_id: i64) -> Result<Option<SyncTask>, QueueError> {
        Ok(self.repository.find_by_id(task_id).await?)
    }
}

#[async_trait]
impl<T: SyncQueue + ?Sized> SyncQueue for Arc<T> {
    async fn enqueue(&self, task: NewSyncTask) -> Result<SyncTask, QueueError> {
        (**self).enqueue(task).await
    }

    async fn claim(&self, limit: u64) -> Result<Vec<SyncTask>, QueueError> {
        (**self).claim(limit).await
    }

    async fn complete(&self, task_id: i64) -> Result<bool, QueueError> {
        (**self).complete(task_id).await
    }

    async fn fail(&self, task_id: i64, details: FailureDetails) -> Result<bool, QueueError> {
        (**self).fail(task_id, details).await
    }

    async fn reschedule(
        &self,
        task_id: i64,
        delay: Duration,
        details: FailureDetails,
    ) -> Result<(), QueueError> {
        (**self).reschedule(task_id, delay, details).await
    }

    async fn postpone_all_for_main_account(
        &self,
        main_account_id: i64,
        delay: Duration,
        exclude_task_id: Option<i64>,
    ) -> Result<u64, QueueError> {
        (**self)
            .postpone_all_for_main_account(main_account_id, delay, exclude_task_id)
            .await
    }

    async fn retry(&self, task_id: i64) -> Result<SyncTask, QueueError> {
        (**self).retry(task_id).await
    }

    async fn find(&self, task_id: i64) -> Result<Option<SyncTask>, QueueError> {
        (**self).find(task_id).await
    }
}
