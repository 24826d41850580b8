//! Create API key table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiKey::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApiKey::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(ApiKey::KeyHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ApiKey::Name).string().not_null())
                    .col(ColumnDef::new(ApiKey::CommunityModelId).string().not_null())
                    .col(
                        ColumnDef::new(ApiKey::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ApiKey::LastUsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ApiKey::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_api_key_community_model")
                            .from(ApiKey::Table, ApiKey::CommunityModelId)
                            .to(CommunityModel::Table, CommunityModel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_key_community_model_id")
                    .table(ApiKey::Table)
                    .col(ApiKey::CommunityModelId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiKey::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ApiKey {
    Table,
    Id,
    KeyHash,
    Name,
    CommunityModelId,
    Enabled,
    LastUsedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum CommunityModel {
    Table,
    Id,
}
