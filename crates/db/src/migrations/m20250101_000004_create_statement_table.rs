//! Create statement table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Statement::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Statement::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Statement::PollId).string().not_null())
                    .col(ColumnDef::new(Statement::Text).text().not_null())
                    .col(ColumnDef::new(Statement::ParticipantId).string().null())
                    .col(
                        ColumnDef::new(Statement::Status)
                            .string_len(16)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(Statement::AgreeCount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Statement::AgreeCount).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Statement::DisagreeCount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Statement::DisagreeCount).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Statement::PassCount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Statement::PassCount).gte(0)),
                    )
                    .col(ColumnDef::new(Statement::IsConstitutionable).boolean().null())
                    .col(ColumnDef::new(Statement::GacScore).double().null())
                    .col(ColumnDef::new(Statement::PriorityScore).double().null())
                    .col(
                        ColumnDef::new(Statement::LastCalculatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Statement::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Statement::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Statement::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_statement_poll")
                            .from(Statement::Table, Statement::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_statement_participant")
                            .from(Statement::Table, Statement::ParticipantId)
                            .to(Participant::Table, Participant::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_statement_poll_id")
                    .table(Statement::Table)
                    .col(Statement::PollId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_statement_participant_id")
                    .table(Statement::Table)
                    .col(Statement::ParticipantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Statement::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Statement {
    Table,
    Id,
    PollId,
    Text,
    ParticipantId,
    Status,
    AgreeCount,
    DisagreeCount,
    PassCount,
    IsConstitutionable,
    GacScore,
    PriorityScore,
    LastCalculatedAt,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Poll {
    Table,
    Id,
}

#[derive(Iden)]
pub enum Participant {
    Table,
    Id,
}
