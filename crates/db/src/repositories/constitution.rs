//! Constitution repository.

use std::sync::Arc;

use crate::entities::{Constitution, constitution};
use osccai_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Constitution repository for database operations.
#[derive(Clone)]
pub struct ConstitutionRepository {
    db: Arc<DatabaseConnection>,
}

impl ConstitutionRepository {
    /// Create a new constitution repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a constitution by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<constitution::Model>> {
        Constitution::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All versions of a model's constitution, newest first.
    pub async fn find_by_model(
        &self,
        community_model_id: &str,
    ) -> AppResult<Vec<constitution::Model>> {
        Constitution::find()
            .filter(constitution::Column::CommunityModelId.eq(community_model_id))
            .order_by_desc(constitution::Column::Version)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use constitution::ConstitutionStatus;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_model_newest_first() {
        let make = |version: i32, status| constitution::Model {
            id: format!("c{version}"),
            community_model_id: "m1".to_string(),
            version,
            content: String::new(),
            status,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    make(2, ConstitutionStatus::Active),
                    make(1, ConstitutionStatus::Archived),
                ]])
                .into_connection(),
        );

        let repo = ConstitutionRepository::new(db);
        let versions = repo.find_by_model("m1").await.unwrap();

        assert_eq!(versions[0].version, 2);
        assert_eq!(versions[0].status, ConstitutionStatus::Active);
    }
}
