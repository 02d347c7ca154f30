use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookHealth::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookHealth::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookHealth::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(WebhookHealth::EntityType).string().not_null())
                    .col(ColumnDef::new(WebhookHealth::Action).string().not_null())
                    .col(ColumnDef::new(WebhookHealth::RemoteWebhookId).string())
                    .col(
                        ColumnDef::new(WebhookHealth::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(WebhookHealth::CheckAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(WebhookHealth::LastCheckAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(WebhookHealth::LastSuccessAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(WebhookHealth::ErrorMessage).text())
                    .col(
                        ColumnDef::new(WebhookHealth::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_webhook_health_subscription")
                    .table(WebhookHealth::Table)
                    .col(WebhookHealth::AccountId)
                    .col(WebhookHealth::EntityType)
                    .col(WebhookHealth::Action)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookHealth::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookHealth {
    Table,
    Id,
    AccountId,
    EntityType,
    Action,
    RemoteWebhookId,
    IsActive,
    CheckAttempts,
    LastCheckAt,
    LastSuccessAt,
    ErrorMessage,
    CreatedAt,
}
