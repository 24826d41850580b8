//! API key entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// API key scoped to one community model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_key")]
pub struct Model {
    /// Unique identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// SHA-256 of the raw key. The raw key is never stored.
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub key_hash: String,

    /// Human readable label.
    pub name: String,

    /// Community model this key is scoped to.
    #[sea_orm(indexed)]
    pub community_model_id: String,

    /// Revoked keys stay in place with `enabled = false`.
    #[sea_orm(default_value = true)]
    pub enabled: bool,

    #[sea_orm(nullable)]
    pub last_used_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
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
}

impl Related<super::community_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommunityModel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
