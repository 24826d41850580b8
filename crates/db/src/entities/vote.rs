//! Vote entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Value of a single vote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteValue {
    #[sea_orm(string_value = "AGREE")]
    Agree,
    #[sea_orm(string_value = "DISAGREE")]
    Disagree,
    #[sea_orm(string_value = "PASS")]
    Pass,
}

impl VoteValue {
    /// Parse the wire literal. Only the exact upper-case forms are accepted.
    #[must_use]
    pub fn from_literal(value: &str) -> Option<Self> {
        match value {
            "AGREE" => Some(Self::Agree),
            "DISAGREE" => Some(Self::Disagree),
            "PASS" => Some(Self::Pass),
            _ => None,
        }
    }

    /// Wire literal for this value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agree => "AGREE",
            Self::Disagree => "DISAGREE",
            Self::Pass => "PASS",
        }
    }

    /// Statement counter column tracking this value.
    #[must_use]
    pub const fn counter_column(self) -> super::statement::Column {
        match self {
            Self::Agree => super::statement::Column::AgreeCount,
            Self::Disagree => super::statement::Column::DisagreeCount,
            Self::Pass => super::statement::Column::PassCount,
        }
    }
}

/// Vote model. At most one row exists per (statement, participant).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub statement_id: String,

    #[sea_orm(indexed)]
    pub participant_id: String,

    pub vote_value: VoteValue,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::statement::Entity",
        from = "Column::StatementId",
        to = "super::statement::Column::Id",
        on_delete = "Cascade"
    )]
    Statement,

    #[sea_orm(
        belongs_to = "super::participant::Entity",
        from = "Column::ParticipantId",
        to = "super::participant::Column::Id",
        on_delete = "Cascade"
    )]
    Participant,
}

impl Related<super::statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statement.def()
    }
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
