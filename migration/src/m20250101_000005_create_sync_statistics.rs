use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncStatistics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncStatistics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncStatistics::MainAccountId).big_integer())
                    .col(
                        ColumnDef::new(SyncStatistics::ChildAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncStatistics::Category).string().not_null())
                    .col(ColumnDef::new(SyncStatistics::Success).boolean().not_null())
                    .col(
                        ColumnDef::new(SyncStatistics::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncStatistics::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncStatistics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncStatistics {
    Table,
    Id,
    MainAccountId,
    ChildAccountId,
    Category,
    Success,
    DurationMs,
    RecordedAt,
}
