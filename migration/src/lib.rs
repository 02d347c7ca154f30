// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_accounts;
mod m20250101_000002_create_sync_tasks;
mod m20250101_000003_create_entity_mappings;
mod m20250101_000004_create_webhook_health;
mod m20250101_000005_create_sync_statistics;
mod m20250102_000001_create_indexes;

/// 数据库迁移器
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    /// 获取所有迁移
    ///
    /// # 返回值
    ///
    /// 返回迁移列表
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_accounts::Migration),
            Box::new(m20250101_000002_create_sync_tasks::Migration),
            Box::new(m20250101_000003_create_entity_mappings::Migration),
            Box::new(m20250101_000004_create_webhook_health::Migration),
            Box::new(m20250101_000005_create_sync_statistics::Migration),
            Box::new(m20250102_000001_create_indexes::Migration),
        ]
    }
}
