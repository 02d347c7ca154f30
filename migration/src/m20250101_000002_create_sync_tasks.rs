use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncTasks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncTasks::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(SyncTasks::MainAccountId).big_integer())
                    .col(ColumnDef::new(SyncTasks::EntityType).string().not_null())
                    .col(ColumnDef::new(SyncTasks::EntityId).string().not_null())
                    .col(ColumnDef::new(SyncTasks::Operation).string().not_null())
                    .col(
                        ColumnDef::new(SyncTasks::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncTasks::FairnessSeq)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncTasks::Status).string().not_null())
                    .col(
                        ColumnDef::new(SyncTasks::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncTasks::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(SyncTasks::Payload).json().not_null())
                    .col(ColumnDef::new(SyncTasks::Error).text())
                    .col(ColumnDef::new(SyncTasks::RateLimitInfo).json())
                    .col(ColumnDef::new(SyncTasks::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncTasks::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncTasks::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SyncTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncTasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncTasks {
    Table,
    Id,
    AccountId,
    MainAccountId,
    EntityType,
    EntityId,
    Operation,
    Priority,
    FairnessSeq,
    Status,
    Attempts,
    MaxAttempts,
    Payload,
    Error,
    RateLimitInfo,
    ScheduledAt,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}
