//! Statement repository.

use std::sync::Arc;

use crate::entities::{Statement, statement};
use chrono::Utc;
use osccai_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait, sea_query::Expr,
};

/// Scores for one statement as reported by the scoring service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    /// Statement the scores belong to.
    pub statement_id: String,
    /// Consensus score.
    pub gac_score: Option<f64>,
    /// Priority score.
    pub priority_score: Option<f64>,
}

/// Statement repository for database operations.
#[derive(Clone)]
pub struct StatementRepository {
    db: Arc<DatabaseConnection>,
}

impl StatementRepository {
    /// Create a new statement repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a statement by ID, including soft-deleted statements.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<statement::Model>> {
        Statement::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a live statement by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<statement::Model> {
        self.find_by_id(id)
            .await?
            .filter(|s| !s.deleted)
            .ok_or_else(|| AppError::NotFound("Statement not found".to_string()))
    }

    /// Live statements of a poll, oldest first.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<statement::Model>> {
        Statement::find()
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::Deleted.eq(false))
            .order_by_asc(statement::Column::CreatedAt)
            .order_by_asc(statement::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Live statements across several polls.
    pub async fn find_by_polls(&self, poll_ids: &[String]) -> AppResult<Vec<statement::Model>> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        Statement::find()
            .filter(statement::Column::PollId.is_in(poll_ids.iter().cloned()))
            .filter(statement::Column::Deleted.eq(false))
            .order_by_asc(statement::Column::CreatedAt)
            .order_by_asc(statement::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count live statements of a poll.
    pub async fn count_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        Statement::find()
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::Deleted.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count live statements a participant submitted to a poll.
    pub async fn count_by_author_in_poll(
        &self,
        participant_id: &str,
        poll_id: &str,
    ) -> AppResult<u64> {
        Statement::find()
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::ParticipantId.eq(participant_id))
            .filter(statement::Column::Deleted.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new statement.
    pub async fn create(&self, model: statement::ActiveModel) -> AppResult<statement::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Soft-delete a statement. Votes and counters are left untouched.
    pub async fn soft_delete(&self, id: &str) -> AppResult<bool> {
        let result = Statement::update_many()
            .col_expr(statement::Column::Deleted, Expr::value(true))
            .col_expr(statement::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(statement::Column::Id.eq(id))
            .filter(statement::Column::Deleted.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Soft-delete every statement of a poll.
    pub async fn soft_delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = Statement::update_many()
            .col_expr(statement::Column::Deleted, Expr::value(true))
            .col_expr(statement::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::Deleted.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Write back scores for statements of one poll.
    ///
    /// Only the score columns are touched, so this never races with the
    /// counter updates of the vote path. Unknown or foreign statement ids are
    /// skipped; the number of rows written is returned.
    pub async fn record_scores(&self, poll_id: &str, scores: &[ScoreUpdate]) -> AppResult<u64> {
        let now = Utc::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut updated = 0;
        for score in scores {
            let result = Statement::update_many()
                .col_expr(statement::Column::GacScore, Expr::value(score.gac_score))
                .col_expr(
                    statement::Column::PriorityScore,
                    Expr::value(score.priority_score),
                )
                .col_expr(statement::Column::LastCalculatedAt, Expr::value(now))
                .filter(statement::Column::Id.eq(score.statement_id.as_str()))
                .filter(statement::Column::PollId.eq(poll_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            updated += result.rows_affected;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }
}
