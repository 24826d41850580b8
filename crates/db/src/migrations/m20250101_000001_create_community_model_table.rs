//! Create community model table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommunityModel::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommunityModel::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CommunityModel::OwnerId).string().not_null())
                    .col(ColumnDef::new(CommunityModel::Name).string().not_null())
                    .col(ColumnDef::new(CommunityModel::Goal).text().not_null())
                    .col(ColumnDef::new(CommunityModel::Bio).text().null())
                    .col(
                        ColumnDef::new(CommunityModel::ActiveConstitutionId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CommunityModel::Published)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CommunityModel::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CommunityModel::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_community_model_owner_id")
                    .table(CommunityModel::Table)
                    .col(CommunityModel::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommunityModel::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CommunityModel {
    Table,
    Id,
    OwnerId,
    Name,
    Goal,
    Bio,
    ActiveConstitutionId,
    Published,
    CreatedAt,
    UpdatedAt,
}
