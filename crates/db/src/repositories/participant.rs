//! Participant repository.

use std::sync::Arc;

use crate::{
    entities::{Participant, participant},
    map_db_err,
};
use osccai_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Participant repository for database operations.
#[derive(Clone)]
pub struct ParticipantRepository {
    db: Arc<DatabaseConnection>,
}

impl ParticipantRepository {
    /// Create a new participant repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a participant by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<participant::Model>> {
        Participant::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a participant by anonymous handle.
    pub async fn find_by_anonymous_id(
        &self,
        anonymous_id: &str,
    ) -> AppResult<Option<participant::Model>> {
        Participant::find()
            .filter(participant::Column::AnonymousId.eq(anonymous_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a participant by linked account.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<participant::Model>> {
        Participant::find()
            .filter(participant::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a participant.
    ///
    /// A unique violation on either identity column surfaces as
    /// [`AppError::Conflict`] so callers can refetch the winner.
    pub async fn create(&self, model: participant::ActiveModel) -> AppResult<participant::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }
}
