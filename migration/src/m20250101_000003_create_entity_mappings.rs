use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EntityMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EntityMappings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EntityMappings::ParentAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntityMappings::ChildAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EntityMappings::EntityType).string().not_null())
                    .col(
                        ColumnDef::new(EntityMappings::ParentEntityId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntityMappings::ChildEntityId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntityMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_entity_mappings_scope")
                    .table(EntityMappings::Table)
                    .col(EntityMappings::ParentAccountId)
                    .col(EntityMappings::ChildAccountId)
                    .col(EntityMappings::EntityType)
                    .col(EntityMappings::ParentEntityId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntityMappings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EntityMappings {
    Table,
    Id,
    ParentAccountId,
    ChildAccountId,
    EntityType,
    ParentEntityId,
    ChildEntityId,
    CreatedAt,
}
