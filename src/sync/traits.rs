// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::account::{Account, AccountSettings};
use crate::domain::models::rate_limit::RateLimitSignal;
use crate::domain::models::sync_task::{EntityType, SyncTask};
use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::domain::services::remote_api::RemoteError;
use async_trait::async_trait;
use thiserror::Error;

/// 同步错误
#[derive(Error, Debug)]
pub enum SyncError {
    /// 远程调用失败
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// 没有为该实体类型注册处理器
    #[error("No handler registered for entity type '{0}'")]
    UnknownEntityType(String),

    /// 任务引用的账号不存在或未加载
    #[error("Account {0} not found")]
    MissingAccount(i64),

    /// 任务负载缺少必要字段
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// 本地存储错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SyncError {
    /// 如果是限流错误，返回限流信号
    pub fn rate_limit_signal(&self) -> Option<&RateLimitSignal> {
        match self {
            SyncError::Remote(RemoteError::RateLimited(signal)) => Some(signal),
            _ => None,
        }
    }
}

/// 处理器执行时可用的上下文
///
/// 账号和设置均来自批次预加载的缓存
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    /// 执行任务的子账号
    pub account: &'a Account,
    /// 驱动任务的主账号；缓存中没有时为空
    pub main_account: Option<&'a Account>,
    /// 子账号的同步设置
    pub settings: Option<&'a AccountSettings>,
}

impl<'a> SyncContext<'a> {
    /// 主账号ID：优先取已加载的主账号，否则取子账号的上级
    pub fn main_account_id(&self) -> Option<i64> {
        self.main_account
            .map(|a| a.id)
            .or(self.account.parent_account_id)
    }
}

/// 处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 已同步到远端
    Synced { remote_id: Option<String> },
    /// 按设置或状态跳过，无远程调用
    Skipped { reason: String },
}

impl HandlerOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        HandlerOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

/// 实体同步处理器
///
/// 每种实体类型一个实现，通过 `TaskDispatcher::register` 注册
#[async_trait]
pub trait EntitySyncHandler: Send + Sync {
    /// 处理器负责的实体类型
    fn entity_type(&self) -> EntityType;

    /// 执行一个已领取的任务
    async fn handle(
        &self,
        task: &SyncTask,
        ctx: SyncContext<'_>,
    ) -> Result<HandlerOutcome, SyncError>;
}
