//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_community_model_table;
mod m20250101_000002_create_poll_table;
mod m20250101_000003_create_participant_table;
mod m20250101_000004_create_statement_table;
mod m20250101_000005_create_vote_table;
mod m20250101_000006_create_api_key_table;
mod m20250101_000007_create_constitution_table;
mod m20250101_000008_create_system_event_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_community_model_table::Migration),
            Box::new(m20250101_000002_create_poll_table::Migration),
            Box::new(m20250101_000003_create_participant_table::Migration),
            Box::new(m20250101_000004_create_statement_table::Migration),
            Box::new(m20250101_000005_create_vote_table::Migration),
            Box::new(m20250101_000006_create_api_key_table::Migration),
            Box::new(m20250101_000007_create_constitution_table::Migration),
            Box::new(m20250101_000008_create_system_event_table::Migration),
        ]
    }
}
