// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::entity_mapping::{EntityMapping, MappingKey};
use crate::domain::models::sync_task::EntityType;
use crate::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::infrastructure::database::entities::entity_mapping as mapping_entity;
use crate::utils::time;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
};
use std::sync::Arc;

/// 实体映射仓库实现
#[derive(Clone)]
pub struct EntityMappingRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl EntityMappingRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_model(
        &self,
        key: &MappingKey,
    ) -> Result<Option<mapping_entity::Model>, RepositoryError> {
        let model = mapping_entity::Entity::find()
            .filter(mapping_entity::Column::ParentAccountId.eq(key.parent_account_id))
            .filter(mapping_entity::Column::ChildAccountId.eq(key.child_account_id))
            .filter(mapping_entity::Column::EntityType.eq(key.entity_type.to_string()))
            .filter(mapping_entity::Column::ParentEntityId.eq(key.parent_entity_id.as_str()))
            .one(self.db.as_ref())
            .await?;
        Ok(model)
    }
}

impl From<mapping_entity::Model> for EntityMapping {
    fn from(model: mapping_entity::Model) -> Self {
        Self {
            id: model.id,
            parent_account_id: model.parent_account_id,
            child_account_id: model.child_account_id,
            entity_type: EntityType::from(model.entity_type),
            parent_entity_id: model.parent_entity_id,
            child_entity_id: model.child_entity_id,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl EntityMappingRepository for EntityMappingRepositoryImpl {
    async fn find(&self, key: &MappingKey) -> Result<Option<EntityMapping>, RepositoryError> {
        Ok(self.find_model(key).await?.map(EntityMapping::from))
    }

    async fn save(
        &self,
        key: &MappingKey,
        child_entity_id: &str,
    ) -> Result<EntityMapping, RepositoryError> {
        let saved = match self.find_model(key).await? {
            Some(existing) => {
                let mut active: mapping_entity::ActiveModel = existing.into();
                active.child_entity_id = Set(child_entity_id.to_string());
                active.update(self.db.as_ref()).await?
            }
            None => {
                mapping_entity::ActiveModel {
                    id: NotSet,
                    parent_account_id: Set(key.parent_account_id),
                    child_account_id: Set(key.child_account_id),
                    entity_type: Set(key.entity_type.to_string()),
                    parent_entity_id: Set(key.parent_entity_id.clone()),
                    child_entity_id: Set(child_entity_id.to_string()),
                    created_at: Set(time::now()),
                }
                .insert(self.db.as_ref())
                .await?
            }
        };
        Ok(saved.into())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        mapping_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
