// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::sync_task::EntityType;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 实体映射
///
/// 主账号实体ID与子账号实体ID的对应关系，
/// 作用域为 (parent_account_id, child_account_id, entity_type)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub id: i64,
    pub parent_account_id: i64,
    pub child_account_id: i64,
    pub entity_type: EntityType,
    pub parent_entity_id: String,
    pub child_entity_id: String,
    pub created_at: DateTime<FixedOffset>,
}

/// 映射查找键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub parent_account_id: i64,
    pub child_account_id: i64,
    pub entity_type: EntityType,
    pub parent_entity_id: String,
}

impl MappingKey {
    pub fn new(
        parent_account_id: i64,
        child_account_id: i64,
        entity_type: EntityType,
        parent_entity_id: impl Into<String>,
    ) -> Self {
        Self {
            parent_account_id,
            child_account_id,
            entity_type,
            parent_entity_id: parent_entity_id.into(),
        }
    }
}
