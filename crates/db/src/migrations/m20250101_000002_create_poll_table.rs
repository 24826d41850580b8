//! Create poll table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Poll::CommunityModelId).string().not_null())
                    .col(ColumnDef::new(Poll::Title).string().not_null())
                    .col(ColumnDef::new(Poll::Description).text().null())
                    .col(
                        ColumnDef::new(Poll::Published)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::RequireAuth)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::AllowParticipantStatements)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Poll::MaxVotesPerParticipant).integer().null())
                    .col(ColumnDef::new(Poll::MinVotesBeforeSubmission).integer().null())
                    .col(
                        ColumnDef::new(Poll::MaxSubmissionsPerParticipant)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Poll::MinRequiredSubmissions).integer().null())
                    .col(ColumnDef::new(Poll::CompletionMessage).text().null())
                    .col(
                        ColumnDef::new(Poll::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Poll::UpdatedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_community_model")
                            .from(Poll::Table, Poll::CommunityModelId)
                            .to(CommunityModel::Table, CommunityModel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_community_model_id")
                    .table(Poll::Table)
                    .col(Poll::CommunityModelId)
                    .to_owned(),
            )
            .await?;

        // Batch recalculation scans published, live polls
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_published_deleted")
                    .table(Poll::Table)
                    .col(Poll::Published)
                    .col(Poll::Deleted)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Poll {
    Table,
    Id,
    CommunityModelId,
    Title,
    Description,
    Published,
    RequireAuth,
    AllowParticipantStatements,
    MaxVotesPerParticipant,
    MinVotesBeforeSubmission,
    MaxSubmissionsPerParticipant,
    MinRequiredSubmissions,
    CompletionMessage,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum CommunityModel {
    Table,
    Id,
}
