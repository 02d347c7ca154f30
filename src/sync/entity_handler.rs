// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::transform::{retain_fields, EntityTransformer};
use super::traits::{EntitySyncHandler, HandlerOutcome, SyncContext, SyncError};
use crate::domain::models::entity_mapping::{EntityMapping, MappingKey};
use crate::domain::models::sync_task::{EntityType, SyncOperation, SyncTask};
use crate::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use crate::domain::services::remote_api::{RemoteApiClient, RemoteError};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 单实体处理器
///
/// 商品、变体、套装、订单、图片共用同一套逻辑，区别只在资源路径：
/// - create：`POST /{resource}`，保存返回的子账号实体ID；已有映射时按 update 处理
/// - update：`POST /{resource}/{child_id}`，没有映射时退化为 create
/// - archive：`POST /{resource}/{child_id}/archive`，没有映射时跳过
/// - sync：有映射则 update，否则 create
pub struct RemoteEntityHandler {
    entity_type: EntityType,
    mappings: Arc<dyn EntityMappingRepository>,
    remote: Arc<dyn RemoteApiClient>,
    transformer: Arc<dyn EntityTransformer>,
}

impl RemoteEntityHandler {
    pub fn new(
        entity_type: EntityType,
        mappings: Arc<dyn EntityMappingRepository>,
        remote: Arc<dyn RemoteApiClient>,
        transformer: Arc<dyn EntityTransformer>,
    ) -> Self {
        Self {
            entity_type,
            mappings,
            remote,
            transformer,
        }
    }

    fn collection_endpoint(&self) -> String {
        format!("/{}", self.entity_type.resource())
    }

    fn item_endpoint(&self, child_id: &str) -> String {
        format!("/{}/{}", self.entity_type.resource(), child_id)
    }

    async fn create(
        &self,
        task: &SyncTask,
        ctx: &SyncContext<'_>,
        key: &MappingKey,
    ) -> Result<HandlerOutcome, SyncError> {
        let body = self.transformer.transform(task, ctx)?;
        let response = self
            .remote
            .post(ctx.account, &self.collection_endpoint(), &body)
            .await?;

        let child_id = response.id().ok_or_else(|| {
            RemoteError::InvalidResponse(format!(
                "create {} returned no id",
                self.entity_type
            ))
        })?;

        self.mappings.save(key, &child_id).await?;
        info!(
            "Created {} {} as {} in account {}",
            self.entity_type, task.entity_id, child_id, ctx.account.id
        );

        Ok(HandlerOutcome::Synced {
            remote_id: Some(child_id),
        })
    }

    async fn update(
        &self,
        task: &SyncTask,
        ctx: &SyncContext<'_>,
        key: &MappingKey,
        mapping: EntityMapping,
    ) -> Result<HandlerOutcome, SyncError> {
        let mut body = self.transformer.transform(task, ctx)?;
        if let Some(fields) = task.updated_fields() {
            body = retain_fields(&body, &fields);
        }

        match self
            .remote
            .post(ctx.account, &self.item_endpoint(&mapping.child_entity_id), &body)
            .await
        {
            Ok(_) => Ok(HandlerOutcome::Synced {
                remote_id: Some(mapping.child_entity_id),
            }),
            Err(e) if e.is_not_found() => {
                // 子账号中的实体已被删除，映射失效
                warn!(
                    "Mapped {} {} missing in account {}, recreating",
                    self.entity_type, mapping.child_entity_id, ctx.account.id
                );
                self.mappings.delete(mapping.id).await?;
                self.create(task, ctx, key).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn archive(
        &self,
        ctx: &SyncContext<'_>,
        mapping: Option<EntityMapping>,
    ) -> Result<HandlerOutcome, SyncError> {
        let Some(mapping) = mapping else {
            return Ok(HandlerOutcome::skipped("no mapping to archive"));
        };

        let endpoint = format!("{}/archive", self.item_endpoint(&mapping.child_entity_id));
        self.remote.post(ctx.account, &endpoint, &json!({})).await?;

        Ok(HandlerOutcome::Synced {
            remote_id: Some(mapping.child_entity_id),
        })
    }
}

#[async_trait]
impl EntitySyncHandler for RemoteEntityHandler {
    fn entity_type(&self) -> EntityType {
        self.entity_type.clone()
    }

    async fn handle(
        &self,
        task: &SyncTask,
        ctx: SyncContext<'_>,
    ) -> Result<HandlerOutcome, SyncError> {
        if let Some(settings) = ctx.settings {
            if !settings.allows(&self.entity_type) {
                debug!(
                    "Account {} does not sync {}, skipping task {}",
                    ctx.account.id,
                    self.entity_type.category(),
                    task.id
                );
                return Ok(HandlerOutcome::skipped(format!(
                    "{} sync disabled",
                    self.entity_type.category()
                )));
            }
        }

        let main_account_id = ctx.main_account_id().ok_or_else(|| {
            SyncError::InvalidPayload(format!("task {} has no main_account_id", task.id))
        })?;
        let key = MappingKey::new(
            main_account_id,
            ctx.account.id,
            self.entity_type.clone(),
            task.entity_id.clone(),
        );
        let mapping = self.mappings.find(&key).await?;

        match (task.operation, mapping) {
            (SyncOperation::Archive, mapping) => self.archive(&ctx, mapping).await,
            (_, Some(mapping)) => self.update(task, &ctx, &key, mapping).await,
            (_, None) => self.create(task, &ctx, &key).await,
        }
    }
}

