//! API key repository.

use std::sync::Arc;

use crate::entities::{ApiKey, api_key};
use chrono::Utc;
use osccai_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};

/// API key repository for database operations.
#[derive(Clone)]
pub struct ApiKeyRepository {
    db: Arc<DatabaseConnection>,
}

impl ApiKeyRepository {
    /// Create a new API key repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a key by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<api_key::Model>> {
        ApiKey::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a key by the hash of its raw secret.
    pub async fn find_by_hash(&self, key_hash: &str) -> AppResult<Option<api_key::Model>> {
        ApiKey::find()
            .filter(api_key::Column::KeyHash.eq(key_hash))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Keys of a community model, newest first.
    pub async fn find_by_model(&self, community_model_id: &str) -> AppResult<Vec<api_key::Model>> {
        ApiKey::find()
            .filter(api_key::Column::CommunityModelId.eq(community_model_id))
            .order_by_desc(api_key::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new key.
    pub async fn create(&self, model: api_key::ActiveModel) -> AppResult<api_key::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Disable a key. Returns whether a key was changed.
    pub async fn disable(&self, id: &str) -> AppResult<bool> {
        let result = ApiKey::update_many()
            .col_expr(api_key::Column::Enabled, Expr::value(false))
            .filter(api_key::Column::Id.eq(id))
            .filter(api_key::Column::Enabled.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Record a successful authentication.
    pub async fn touch_last_used(&self, id: &str) -> AppResult<()> {
        ApiKey::update_many()
            .col_expr(api_key::Column::LastUsedAt, Expr::value(Utc::now()))
            .filter(api_key::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
