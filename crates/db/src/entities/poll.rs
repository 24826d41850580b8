//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning community model.
    #[sea_orm(indexed)]
    pub community_model_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Visible to participants. Requires at least one statement.
    #[sea_orm(default_value = false)]
    pub published: bool,

    /// Only signed-in accounts may participate.
    #[sea_orm(default_value = false)]
    pub require_auth: bool,

    /// Participants may submit their own statements.
    #[sea_orm(default_value = true)]
    pub allow_participant_statements: bool,

    /// Upper bound on votes cast by one participant (null for unlimited).
    #[sea_orm(nullable)]
    pub max_votes_per_participant: Option<i32>,

    /// Votes a participant must cast before submitting a statement.
    #[sea_orm(nullable)]
    pub min_votes_before_submission: Option<i32>,

    /// Upper bound on statements submitted by one participant.
    #[sea_orm(nullable)]
    pub max_submissions_per_participant: Option<i32>,

    /// Statements a participant must submit before the poll counts as complete.
    #[sea_orm(nullable)]
    pub min_required_submissions: Option<i32>,

    /// Message shown once a participant completes the poll.
    #[sea_orm(column_type = "Text", nullable)]
    pub completion_message: Option<String>,

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
        belongs_to = "super::community_model::Entity",
        from = "Column::CommunityModelId",
        to = "super::community_model::Column::Id",
        on_delete = "Cascade"
    )]
    CommunityModel,

    #[sea_orm(has_many = "super::statement::Entity")]
    Statement,
}

impl Related<super::community_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommunityModel.def()
    }
}

impl Related<super::statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
