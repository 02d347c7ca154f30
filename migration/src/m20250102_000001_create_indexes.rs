use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Claim path: status + priority + fairness ordering
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_tasks_claim")
                    .table(SyncTasks::Table)
                    .col(SyncTasks::Status)
                    .col(SyncTasks::Priority)
                    .col(SyncTasks::FairnessSeq)
                    .col(SyncTasks::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // Bulk postpone on global rate-limit exhaustion
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_tasks_main_account_status")
                    .table(SyncTasks::Table)
                    .col(SyncTasks::MainAccountId)
                    .col(SyncTasks::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_sync_tasks_main_account_status").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_sync_tasks_claim").to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum SyncTasks {
    Table,
    Status,
    Priority,
    FairnessSeq,
    ScheduledAt,
    MainAccountId,
}
