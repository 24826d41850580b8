//! Statement entity with per-value vote counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moderation status of a statement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

/// Statement model.
///
/// `agree_count`, `disagree_count` and `pass_count` always equal the number of
/// vote rows holding the matching value. They are only written by the tally
/// engine, inside the same transaction as the vote row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "statement")]
pub struct Model {
    /// Unique identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Poll this statement belongs to.
    #[sea_orm(indexed)]
    pub poll_id: String,

    /// Statement text.
    #[sea_orm(column_type = "Text")]
    pub text: String,

    /// Author, if submitted by a participant.
    #[sea_orm(nullable, indexed)]
    pub participant_id: Option<String>,

    /// Moderation status.
    pub status: StatementStatus,

    /// Number of AGREE votes.
    #[sea_orm(default_value = 0)]
    pub agree_count: i32,

    /// Number of DISAGREE votes.
    #[sea_orm(default_value = 0)]
    pub disagree_count: i32,

    /// Number of PASS votes.
    #[sea_orm(default_value = 0)]
    pub pass_count: i32,

    /// Explicit eligibility override. Null defers to the vote threshold.
    #[sea_orm(nullable)]
    pub is_constitutionable: Option<bool>,

    /// Consensus score written back by the scoring service.
    #[sea_orm(nullable)]
    pub gac_score: Option<f64>,

    /// Priority score written back by the scoring service.
    #[sea_orm(nullable)]
    pub priority_score: Option<f64>,

    /// When the scores were last written.
    #[sea_orm(nullable)]
    pub last_calculated_at: Option<DateTimeWithTimeZone>,

    /// Soft-delete marker.
    #[sea_orm(default_value = false)]
    pub deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,

    #[sea_orm(
        belongs_to = "super::participant::Entity",
        from = "Column::ParticipantId",
        to = "super::participant::Column::Id",
        on_delete = "SetNull"
    )]
    Participant,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
