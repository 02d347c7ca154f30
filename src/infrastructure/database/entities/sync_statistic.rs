// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_statistics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub main_account_id: Option<i64>,
    pub child_account_id: i64,
    pub category: String,
    pub success: bool,
    pub duration_ms: i64,
    pub recorded_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
