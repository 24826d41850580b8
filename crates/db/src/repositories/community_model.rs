//! Community model repository.

use std::sync::Arc;

use crate::entities::{CommunityModel, community_model};
use osccai_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Community model repository for database operations.
#[derive(Clone)]
pub struct CommunityModelRepository {
    db: Arc<DatabaseConnection>,
}

impl CommunityModelRepository {
    /// Create a new community model repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a community model by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<community_model::Model>> {
        CommunityModel::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a community model by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<community_model::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Community model not found".to_string()))
    }

    /// Find all models owned by an account.
    pub async fn find_by_owner(&self, owner_id: &str) -> AppResult<Vec<community_model::Model>> {
        CommunityModel::find()
            .filter(community_model::Column::OwnerId.eq(owner_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new community model.
    pub async fn create(
        &self,
        model: community_model::ActiveModel,
    ) -> AppResult<community_model::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
