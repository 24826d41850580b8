//! Create system event table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SystemEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemEvent::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SystemEvent::EventType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(SystemEvent::ResourceType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SystemEvent::ResourceId).string().not_null())
                    .col(ColumnDef::new(SystemEvent::CommunityModelId).string().null())
                    .col(ColumnDef::new(SystemEvent::ActorId).string().not_null())
                    .col(ColumnDef::new(SystemEvent::ActorName).string().null())
                    .col(
                        ColumnDef::new(SystemEvent::IsAdminAction)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SystemEvent::Metadata)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(SystemEvent::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // No foreign keys: events outlive the rows they describe.
        for (name, column) in [
            ("idx_system_event_event_type", SystemEvent::EventType),
            ("idx_system_event_resource_id", SystemEvent::ResourceId),
            ("idx_system_event_community_model_id", SystemEvent::CommunityModelId),
            ("idx_system_event_actor_id", SystemEvent::ActorId),
            ("idx_system_event_created_at", SystemEvent::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(SystemEvent::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemEvent::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SystemEvent {
    Table,
    Id,
    EventType,
    ResourceType,
    ResourceId,
    CommunityModelId,
    ActorId,
    ActorName,
    IsAdminAction,
    Metadata,
    CreatedAt,
}
