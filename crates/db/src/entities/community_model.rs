//! Community model entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A community whose polls feed a generated constitution.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "community_model")]
pub struct Model {
    /// Unique identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Account that owns this model.
    #[sea_orm(indexed)]
    pub owner_id: String,

    /// Display name.
    pub name: String,

    /// Community goal.
    #[sea_orm(column_type = "Text")]
    pub goal: String,

    /// Community bio.
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    /// Currently active constitution.
    #[sea_orm(nullable)]
    pub active_constitution_id: Option<String>,

    /// Whether the model is publicly visible.
    #[sea_orm(default_value = false)]
    pub published: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll::Entity")]
    Poll,
    #[sea_orm(has_many = "super::api_key::Entity")]
    ApiKey,
    #[sea_orm(has_many = "super::constitution::Entity")]
    Constitution,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl Related<super::constitution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Constitution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
