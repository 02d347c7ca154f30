// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub main_account_id: Option<i64>,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub priority: i32,
    pub fairness_seq: i32,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub rate_limit_info: Option<Json>,
    pub scheduled_at: Option<ChronoDateTimeWithTimeZone>,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
