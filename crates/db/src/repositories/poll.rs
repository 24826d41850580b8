//! Poll repository.

use std::sync::Arc;

use crate::entities::{Poll, poll};
use osccai_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID, including soft-deleted polls.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a live poll by ID. Soft-deleted polls are reported as missing.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .filter(|p| !p.deleted)
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))
    }

    /// Find live polls of a community model.
    pub async fn find_by_model(&self, community_model_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::CommunityModelId.eq(community_model_id))
            .filter(poll::Column::Deleted.eq(false))
            .order_by_asc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find every poll eligible for score recalculation.
    pub async fn find_recalculable(&self) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::Published.eq(true))
            .filter(poll::Column::Deleted.eq(false))
            .order_by_asc(poll::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new poll.
    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
