// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::traits::{EntitySyncHandler, HandlerOutcome, SyncContext, SyncError};
use crate::domain::models::sync_task::{EntityType, SyncTask};
use crate::domain::models::webhook_health::SubscriptionKey;
use crate::domain::services::webhook_health_service::{HealthError, WebhookHealthMonitor};
use async_trait::async_trait;
use std::sync::Arc;

/// Webhook 校验处理器
///
/// `entity_id` 是订阅的 topic，例如 `orders/create`。只检查并记录这一条订阅的健康状态，
/// 检查失败记录在健康表中，不会让任务失败。
pub struct WebhookVerifyHandler {
    monitor: Arc<WebhookHealthMonitor>,
}

impl WebhookVerifyHandler {
    pub fn new(monitor: Arc<WebhookHealthMonitor>) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl EntitySyncHandler for WebhookVerifyHandler {
    fn entity_type(&self) -> EntityType {
        EntityType::Webhook
    }

    async fn handle(
        &self,
        task: &SyncTask,
        ctx: SyncContext<'_>,
    ) -> Result<HandlerOutcome, SyncError> {
        let (entity_type, action) = task.entity_id.split_once('/').ok_or_else(|| {
            SyncError::InvalidPayload(format!("invalid webhook topic '{}'", task.entity_id))
        })?;
        let key = SubscriptionKey::new(entity_type, action);

        let record = self
            .monitor
            .check_subscription(ctx.account, &key)
            .await
            .map_err(|e| match e {
                HealthError::Repository(e) => SyncError::Repository(e),
                HealthError::AccountNotFound(id) => SyncError::MissingAccount(id),
            })?;

        match record {
            Some(record) => Ok(HandlerOutcome::Synced {
                remote_id: record.remote_webhook_id,
            }),
            None => Ok(HandlerOutcome::skipped(format!(
                "no health record for {}",
                key
            ))),
        }
    }
}
