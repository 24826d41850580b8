//! Create vote table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vote::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Vote::StatementId).string().not_null())
                    .col(ColumnDef::new(Vote::ParticipantId).string().not_null())
                    .col(ColumnDef::new(Vote::VoteValue).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Vote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Vote::UpdatedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_statement")
                            .from(Vote::Table, Vote::StatementId)
                            .to(Statement::Table, Statement::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_participant")
                            .from(Vote::Table, Vote::ParticipantId)
                            .to(Participant::Table, Participant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One vote per participant per statement
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_statement_participant")
                    .table(Vote::Table)
                    .col(Vote::StatementId)
                    .col(Vote::ParticipantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vote_participant_id")
                    .table(Vote::Table)
                    .col(Vote::ParticipantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Vote {
    Table,
    Id,
    StatementId,
    ParticipantId,
    VoteValue,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Statement {
    Table,
    Id,
}

#[derive(Iden)]
pub enum Participant {
    Table,
    Id,
}
