//! System event entity.
//!
//! Append-only audit log of changes to models, polls, statements, votes,
//! constitutions and API keys.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    #[sea_orm(string_value = "STATEMENT_ADDED")]
    StatementAdded,
    #[sea_orm(string_value = "VOTE_CAST")]
    VoteCast,
    #[sea_orm(string_value = "GAC_SCORE_UPDATED")]
    GacScoreUpdated,
    #[sea_orm(string_value = "POLL_CREATED")]
    PollCreated,
    #[sea_orm(string_value = "POLL_UPDATED")]
    PollUpdated,
    #[sea_orm(string_value = "CONSTITUTION_GENERATED")]
    ConstitutionGenerated,
    #[sea_orm(string_value = "CONSTITUTION_ACTIVATED")]
    ConstitutionActivated,
    #[sea_orm(string_value = "API_KEY_CREATED")]
    ApiKeyCreated,
    #[sea_orm(string_value = "API_KEY_REVOKED")]
    ApiKeyRevoked,
}

impl EventType {
    /// Parse the stored literal, e.g. `VOTE_CAST`.
    #[must_use]
    pub fn from_literal(value: &str) -> Option<Self> {
        match value {
            "STATEMENT_ADDED" => Some(Self::StatementAdded),
            "VOTE_CAST" => Some(Self::VoteCast),
            "GAC_SCORE_UPDATED" => Some(Self::GacScoreUpdated),
            "POLL_CREATED" => Some(Self::PollCreated),
            "POLL_UPDATED" => Some(Self::PollUpdated),
            "CONSTITUTION_GENERATED" => Some(Self::ConstitutionGenerated),
            "CONSTITUTION_ACTIVATED" => Some(Self::ConstitutionActivated),
            "API_KEY_CREATED" => Some(Self::ApiKeyCreated),
            "API_KEY_REVOKED" => Some(Self::ApiKeyRevoked),
            _ => None,
        }
    }
}

/// Kind of record an event is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ResourceType {
    #[sea_orm(string_value = "CommunityModel")]
    CommunityModel,
    #[sea_orm(string_value = "Statement")]
    Statement,
    #[sea_orm(string_value = "Poll")]
    Poll,
    #[sea_orm(string_value = "Vote")]
    Vote,
    #[sea_orm(string_value = "Constitution")]
    Constitution,
    #[sea_orm(string_value = "ApiKey")]
    ApiKey,
}

impl ResourceType {
    #[must_use]
    pub fn from_literal(value: &str) -> Option<Self> {
        match value {
            "CommunityModel" => Some(Self::CommunityModel),
            "Statement" => Some(Self::Statement),
            "Poll" => Some(Self::Poll),
            "Vote" => Some(Self::Vote),
            "Constitution" => Some(Self::Constitution),
            "ApiKey" => Some(Self::ApiKey),
            _ => None,
        }
    }
}

/// System event model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_event")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub event_type: EventType,

    pub resource_type: ResourceType,

    #[sea_orm(indexed)]
    pub resource_id: String,

    /// Model the resource belongs to, when known.
    #[sea_orm(indexed, nullable)]
    pub community_model_id: Option<String>,

    /// Account id, participant id, API key id or `system`.
    #[sea_orm(indexed)]
    pub actor_id: String,

    #[sea_orm(nullable)]
    pub actor_name: Option<String>,

    pub is_admin_action: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
