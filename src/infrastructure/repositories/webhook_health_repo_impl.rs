// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook_health::{SubscriptionKey, WebhookHealthRecord};
use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::domain::repositories::webhook_health_repository::WebhookHealthRepository;
use crate::infrastructure::database::entities::webhook_health as health_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

/// Webhook 健康记录仓库实现
#[derive(Clone)]
pub struct WebhookHealthRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WebhookHealthRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<health_entity::Model> for WebhookHealthRecord {
    fn from(model: health_entity::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            entity_type: model.entity_type,
            action: model.action,
            remote_webhook_id: model.remote_webhook_id,
            is_active: model.is_active,
            check_attempts: model.check_attempts,
            last_check_at: model.last_check_at,
            last_success_at: model.last_success_at,
            error_message: model.error_message,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl WebhookHealthRepository for WebhookHealthRepositoryImpl {
    async fn find_by_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<WebhookHealthRecord>, RepositoryError> {
        let models = health_entity::Entity::find()
            .filter(health_entity::Column::AccountId.eq(account_id))
            .order_by_asc(health_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(WebhookHealthRecord::from).collect())
    }

    async fn find(
        &self,
        account_id: i64,
        key: &SubscriptionKey,
    ) -> Result<Option<WebhookHealthRecord>, RepositoryError> {
        let model = health_entity::Entity::find()
            .filter(health_entity::Column::AccountId.eq(account_id))
            .filter(health_entity::Column::EntityType.eq(key.entity_type.as_str()))
            .filter(health_entity::Column::Action.eq(key.action.as_str()))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(WebhookHealthRecord::from))
    }

    async fn save(
        &self,
        record: &WebhookHealthRecord,
    ) -> Result<WebhookHealthRecord, RepositoryError> {
        let existing_id = match record.id {
            0 => self
                .find(record.account_id, &record.key())
                .await?
                .map(|r| r.id),
            id => Some(id),
        };

        let mut active = health_entity::ActiveModel {
            id: NotSet,
            account_id: Set(record.account_id),
            entity_type: Set(record.entity_type.clone()),
            action: Set(record.action.clone()),
            remote_webhook_id: Set(record.remote_webhook_id.clone()),
            is_active: Set(record.is_active),
            check_attempts: Set(record.check_attempts),
            last_check_at: Set(record.last_check_at),
            last_success_at: Set(record.last_success_at),
            error_message: Set(record.error_message.clone()),
            created_at: Set(record.created_at),
        };

        let saved = match existing_id {
            Some(id) => {
                active.id = Set(id);
                active.update(self.db.as_ref()).await?
            }
            None => active.insert(self.db.as_ref()).await?,
        };
        Ok(saved.into())
    }
}
