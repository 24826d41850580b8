//! Constitution entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstitutionStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "constitution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub community_model_id: String,

    /// Monotonic per community model, starting at 1.
    pub version: i32,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub status: ConstitutionStatus,

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
