//! Participant entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A voter, identified by a linked account, an anonymous handle, or both.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Linked account identity.
    #[sea_orm(nullable, unique)]
    pub user_id: Option<String>,

    /// Client-generated anonymous handle.
    #[sea_orm(nullable, unique)]
    pub anonymous_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
    #[sea_orm(has_many = "super::statement::Entity")]
    Statement,
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
