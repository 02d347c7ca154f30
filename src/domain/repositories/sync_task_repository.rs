// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::sync_task::{NewSyncTask, SyncTask};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use serde_json::Value;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的数据无法解析
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// 失败路径上需要落库的诊断信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureDetails {
    /// 失败原因
    pub error: Option<String>,
    /// 限流信息
    pub rate_limit_info: Option<Value>,
    /// 新的尝试次数；为空时保持不变
    pub attempts: Option<i32>,
}

impl FailureDetails {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_attempts(mut self, attempts: i32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_rate_limit_info(mut self, info: Value) -> Self {
        self.rate_limit_info = Some(info);
        self
    }
}

/// 同步任务仓库特质
///
/// 队列存储的持久化接口。所有状态转换都在短事务或单条条件更新中完成，
/// 远程调用期间不持有任何行锁。
#[async_trait]
pub trait SyncTaskRepository: Send + Sync {
    /// 创建任务，并分配公平序号
    async fn create(&self, task: &NewSyncTask) -> Result<SyncTask, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: i64) -> Result<Option<SyncTask>, RepositoryError>;
    /// 原子地领取一批到期任务并标记为 processing。
    /// `stuck_before` 之前开始、仍处于 processing 的任务也可被重新领取。
    async fn claim_batch(
        &self,
        limit: u64,
        now: DateTime<FixedOffset>,
        stuck_before: DateTime<FixedOffset>,
    ) -> Result<Vec<SyncTask>, RepositoryError>;
    /// 标记完成；返回是否真的发生了状态转换
    async fn mark_completed(&self, id: i64) -> Result<bool, RepositoryError>;
    /// 标记失败；返回是否真的发生了状态转换
    async fn mark_failed(&self, id: i64, details: FailureDetails) -> Result<bool, RepositoryError>;
    /// 在同一事务中标记失败并创建后续任务。
    /// 任务已不在 processing 时什么也不写，返回 None
    async fn fail_with_followups(
        &self,
        id: i64,
        details: FailureDetails,
        followups: &[NewSyncTask],
    ) -> Result<Option<Vec<SyncTask>>, RepositoryError>;
    /// 放回 pending 并设置新的计划时间
    async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<FixedOffset>,
        details: FailureDetails,
    ) -> Result<(), RepositoryError>;
    /// 推迟某主账号下所有 pending 任务
    async fn postpone_pending_for_main_account(
        &self,
        main_account_id: i64,
        scheduled_at: DateTime<FixedOffset>,
        exclude_task_id: Option<i64>,
    ) -> Result<u64, RepositoryError>;
    /// 将 failed 任务重置为 pending；任务不是 failed 时返回 None
    async fn reset_failed(
        &self,
        id: i64,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<SyncTask>, RepositoryError>;
}
