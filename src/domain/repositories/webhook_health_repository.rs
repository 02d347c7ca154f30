// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::sync_task_repository::RepositoryError;
use crate::domain::models::webhook_health::{SubscriptionKey, WebhookHealthRecord};
use async_trait::async_trait;

/// Webhook 健康记录仓库特质
#[async_trait]
pub trait WebhookHealthRepository: Send + Sync {
    async fn find_by_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<WebhookHealthRecord>, RepositoryError>;
    async fn find(
        &self,
        account_id: i64,
        key: &SubscriptionKey,
    ) -> Result<Option<WebhookHealthRecord>, RepositoryError>;
    /// 按 (account, entity_type, action) 插入或更新
    async fn save(&self, record: &WebhookHealthRecord)
        -> Result<WebhookHealthRecord, RepositoryError>;
}
