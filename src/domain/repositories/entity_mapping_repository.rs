// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::sync_task_repository::RepositoryError;
use crate::domain::models::entity_mapping::{EntityMapping, MappingKey};
use async_trait::async_trait;

/// 实体映射仓库特质
#[async_trait]
pub trait EntityMappingRepository: Send + Sync {
    /// 按作用域和主账号实体ID查找映射
    async fn find(&self, key: &MappingKey) -> Result<Option<EntityMapping>, RepositoryError>;
    /// 保存映射，已存在时覆盖子账号实体ID
    async fn save(
        &self,
        key: &MappingKey,
        child_entity_id: &str,
    ) -> Result<EntityMapping, RepositoryError>;
    /// 删除映射
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}
