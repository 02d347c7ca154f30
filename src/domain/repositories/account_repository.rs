// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::sync_task_repository::RepositoryError;
use crate::domain::models::account::{Account, AccountSettings};
use async_trait::async_trait;

/// 账号仓库特质
///
/// 调度器只读，按批次预加载
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError>;
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Account>, RepositoryError>;
    async fn find_settings(&self, account_ids: &[i64])
        -> Result<Vec<AccountSettings>, RepositoryError>;
    /// 所有启用的账号，供健康检查遍历
    async fn find_active(&self) -> Result<Vec<Account>, RepositoryError>;
}
