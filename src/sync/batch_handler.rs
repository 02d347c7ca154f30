// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::traits::{EntitySyncHandler, HandlerOutcome, SyncContext, SyncError};
use crate::domain::models::entity_mapping::MappingKey;
use crate::domain::models::sync_task::{entity_data, EntityType, SyncTask};
use crate::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use crate::domain::services::remote_api::{value_field, value_id, RemoteApiClient};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// 批量处理器
///
/// 一次 `POST /{resource}/batch` 创建或更新多个实体。已有映射的实体带上子账号ID
/// 走更新，其余走创建。整体失败时由调度器交给批量失败分解器。
pub struct BatchEntityHandler {
    entity_type: EntityType,
    mappings: Arc<dyn EntityMappingRepository>,
    remote: Arc<dyn RemoteApiClient>,
}

impl BatchEntityHandler {
    pub fn new(
        entity_type: EntityType,
        mappings: Arc<dyn EntityMappingRepository>,
        remote: Arc<dyn RemoteApiClient>,
    ) -> Self {
        Self {
            entity_type,
            mappings,
            remote,
        }
    }
}

#[async_trait]
impl EntitySyncHandler for BatchEntityHandler {
    fn entity_type(&self) -> EntityType {
        self.entity_type.clone()
    }

    async fn handle(
        &self,
        task: &SyncTask,
        ctx: SyncContext<'_>,
    ) -> Result<HandlerOutcome, SyncError> {
        let item_type = self.entity_type.item_type();

        if let Some(settings) = ctx.settings {
            if !settings.allows(&item_type) {
                return Ok(HandlerOutcome::skipped(format!(
                    "{} sync disabled",
                    item_type.category()
                )));
            }
        }

        let entities = task.embedded_entities().ok_or_else(|| {
            SyncError::InvalidPayload(format!("batch task {} has no entities", task.id))
        })?;
        let main_account_id = ctx.main_account_id().ok_or_else(|| {
            SyncError::InvalidPayload(format!("task {} has no main_account_id", task.id))
        })?;

        let mut items = Vec::with_capacity(entities.len());
        for entity in entities {
            let Some(source_id) = value_id(entity) else {
                warn!("Skipping entity without id in batch task {}", task.id);
                continue;
            };

            let key = MappingKey::new(
                main_account_id,
                ctx.account.id,
                item_type.clone(),
                source_id.clone(),
            );
            let mut item = json!({
                "source_id": source_id,
                "data": entity_data(entity),
            });
            if let Some(mapping) = self.mappings.find(&key).await? {
                item["id"] = Value::String(mapping.child_entity_id);
            }
            items.push(item);
        }

        if items.is_empty() {
            return Ok(HandlerOutcome::skipped("batch has no valid entities"));
        }

        let endpoint = format!("/{}/batch", item_type.resource());
        let response = self
            .remote
            .post(ctx.account, &endpoint, &json!({ "items": items }))
            .await?;

        // 响应中的每一项带回 source_id 与子账号实体ID
        let mut saved = 0;
        if let Some(results) = response.data.get("items").and_then(Value::as_array) {
            for result in results {
                let source_id = value_field(result, "source_id");
                if let (Some(source_id), Some(child_id)) = (source_id, value_id(result)) {
                    let key = MappingKey::new(
                        main_account_id,
                        ctx.account.id,
                        item_type.clone(),
                        source_id,
                    );
                    self.mappings.save(&key, &child_id).await?;
                    saved += 1;
                }
            }
        }

        info!(
            "Batch task {} synced {} {} entities to account {} ({} mappings saved)",
            task.id,
            items.len(),
            item_type,
            ctx.account.id,
            saved
        );

        Ok(HandlerOutcome::Synced { remote_id: None })
    }
}
