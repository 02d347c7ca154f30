// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entity_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parent_account_id: i64,
    pub child_account_id: i64,
    pub entity_type: String,
    pub parent_entity_id: String,
    pub child_entity_id: String,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
