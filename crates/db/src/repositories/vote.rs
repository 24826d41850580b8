//! Vote repository.
//!
//! Read-side queries only. Vote rows are written exclusively by the tally
//! engine so that counters and rows change in the same transaction.

use std::sync::Arc;

use crate::entities::{Vote, statement, vote};
use osccai_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QuerySelect, RelationTrait,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the vote a participant cast on a statement.
    pub async fn find_by_statement_and_participant(
        &self,
        statement_id: &str,
        participant_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::StatementId.eq(statement_id))
            .filter(vote::Column::ParticipantId.eq(participant_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Votes a participant cast on live statements of a poll.
    pub async fn find_by_participant_in_poll(
        &self,
        participant_id: &str,
        poll_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .join(JoinType::InnerJoin, vote::Relation::Statement.def())
            .filter(vote::Column::ParticipantId.eq(participant_id))
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::Deleted.eq(false))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count votes a participant cast on live statements of a poll.
    pub async fn count_by_participant_in_poll(
        &self,
        participant_id: &str,
        poll_id: &str,
    ) -> AppResult<u64> {
        Vote::find()
            .join(JoinType::InnerJoin, vote::Relation::Statement.def())
            .filter(vote::Column::ParticipantId.eq(participant_id))
            .filter(statement::Column::PollId.eq(poll_id))
            .filter(statement::Column::Deleted.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count vote rows per value for one statement.
    ///
    /// Used to audit the denormalized counters on the statement row.
    pub async fn tally_rows(&self, statement_id: &str) -> AppResult<(u64, u64, u64)> {
        let mut counts = [0u64; 3];
        for (slot, value) in [
            vote::VoteValue::Agree,
            vote::VoteValue::Disagree,
            vote::VoteValue::Pass,
        ]
        .into_iter()
        .enumerate()
        {
            counts[slot] = Vote::find()
                .filter(vote::Column::StatementId.eq(statement_id))
                .filter(vote::Column::VoteValue.eq(value))
                .count(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok((counts[0], counts[1], counts[2]))
    }
}
