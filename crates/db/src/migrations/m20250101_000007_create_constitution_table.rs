//! Create constitution table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Constitution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Constitution::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Constitution::CommunityModelId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Constitution::Version).integer().not_null())
                    .col(ColumnDef::new(Constitution::Content).text().not_null())
                    .col(
                        ColumnDef::new(Constitution::Status)
                            .string_len(16)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Constitution::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_constitution_community_model")
                            .from(Constitution::Table, Constitution::CommunityModelId)
                            .to(CommunityModel::Table, CommunityModel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Versions are unique per model
        manager
            .create_index(
                Index::create()
                    .name("idx_constitution_model_version")
                    .table(Constitution::Table)
                    .col(Constitution::CommunityModelId)
                    .col(Constitution::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Constitution::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Constitution {
    Table,
    Id,
    CommunityModelId,
    Version,
    Content,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum CommunityModel {
    Table,
    Id,
}
