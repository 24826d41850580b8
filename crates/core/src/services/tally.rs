//! Vote tally engine.
//!
//! Every vote mutation runs in one transaction that locks the statement row,
//! writes the vote row and adjusts exactly the affected counters. Counters on
//! a statement therefore always equal the number of vote rows per value.

use std::sync::Arc;

use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{
    entities::{
        Statement, Vote, statement,
        vote::{self, VoteValue},
    },
    map_db_err,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Signed change to each counter of a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterDelta {
    pub agree: i32,
    pub disagree: i32,
    pub pass: i32,
}

impl CounterDelta {
    fn bump(&mut self, value: VoteValue, by: i32) {
        match value {
            VoteValue::Agree => self.agree += by,
            VoteValue::Disagree => self.disagree += by,
            VoteValue::Pass => self.pass += by,
        }
    }

    /// Delta for casting `new` over an optional previous vote.
    #[must_use]
    pub fn for_vote(existing: Option<VoteValue>, new: VoteValue) -> Self {
        let mut delta = Self::default();
        match existing {
            Some(old) if old == new => {}
            Some(old) => {
                delta.bump(old, -1);
                delta.bump(new, 1);
            }
            None => delta.bump(new, 1),
        }
        delta
    }

    /// Delta for removing a vote.
    #[must_use]
    pub fn for_retraction(existing: VoteValue) -> Self {
        let mut delta = Self::default();
        delta.bump(existing, -1);
        delta
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.agree == 0 && self.disagree == 0 && self.pass == 0
    }

    /// Apply the delta to an in-memory statement.
    pub fn apply_to(&self, statement: &mut statement::Model) {
        statement.agree_count += self.agree;
        statement.disagree_count += self.disagree;
        statement.pass_count += self.pass;
    }
}

/// What a vote call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Created,
    Changed,
    Unchanged,
}

/// Result of [`TallyEngine::apply_vote`].
#[derive(Debug, Clone)]
pub struct VoteResult {
    pub vote: vote::Model,
    pub outcome: VoteOutcome,
    /// Statement with counters as committed.
    pub statement: statement::Model,
}

/// Applies vote mutations and their counter adjustments atomically.
#[derive(Clone)]
pub struct TallyEngine {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl TallyEngine {
    /// Create a new tally engine.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast or change a participant's vote on a statement.
    ///
    /// Casting the same value twice is a no-op. A conflicting concurrent
    /// writer is retried once against fresh state.
    pub async fn apply_vote(
        &self,
        statement_id: &str,
        participant_id: &str,
        value: VoteValue,
    ) -> AppResult<VoteResult> {
        match self.try_apply(statement_id, participant_id, value).await {
            Err(e) if e.is_retryable() => {
                warn!(statement_id, participant_id, error = %e, "Vote conflicted, retrying");
                self.try_apply(statement_id, participant_id, value).await
            }
            other => other,
        }
    }

    /// Remove a participant's vote from a statement.
    pub async fn retract_vote(
        &self,
        statement_id: &str,
        participant_id: &str,
    ) -> AppResult<statement::Model> {
        match self.try_retract(statement_id, participant_id).await {
            Err(e) if e.is_retryable() => {
                warn!(statement_id, participant_id, error = %e, "Retraction conflicted, retrying");
                self.try_retract(statement_id, participant_id).await
            }
            other => other,
        }
    }

    async fn try_apply(
        &self,
        statement_id: &str,
        participant_id: &str,
        value: VoteValue,
    ) -> AppResult<VoteResult> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let mut statement = lock_statement(&txn, statement_id).await?;

        let existing = Vote::find()
            .filter(vote::Column::StatementId.eq(statement_id))
            .filter(vote::Column::ParticipantId.eq(participant_id))
            .one(&txn)
            .await
            .map_err(map_db_err)?;

        let delta = CounterDelta::for_vote(existing.as_ref().map(|v| v.vote_value), value);
        let now = Utc::now();

        let (vote, outcome) = match existing {
            Some(current) if current.vote_value == value => (current, VoteOutcome::Unchanged),
            Some(current) => {
                let mut active: vote::ActiveModel = current.into();
                active.vote_value = Set(value);
                active.updated_at = Set(Some(now.into()));
                let updated = active.update(&txn).await.map_err(map_db_err)?;
                (updated, VoteOutcome::Changed)
            }
            None => {
                let created = vote::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    statement_id: Set(statement_id.to_string()),
                    participant_id: Set(participant_id.to_string()),
                    vote_value: Set(value),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                }
                .insert(&txn)
                .await
                .map_err(map_db_err)?;
                (created, VoteOutcome::Created)
            }
        };

        adjust_counters(&txn, statement_id, delta).await?;
        txn.commit().await.map_err(map_db_err)?;

        delta.apply_to(&mut statement);
        debug!(
            statement_id,
            participant_id,
            value = value.as_str(),
            ?outcome,
            "Vote applied"
        );

        Ok(VoteResult {
            vote,
            outcome,
            statement,
        })
    }

    async fn try_retract(
        &self,
        statement_id: &str,
        participant_id: &str,
    ) -> AppResult<statement::Model> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let mut statement = lock_statement(&txn, statement_id).await?;

        let existing = Vote::find()
            .filter(vote::Column::StatementId.eq(statement_id))
            .filter(vote::Column::ParticipantId.eq(participant_id))
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| AppError::NotFound("Vote not found".to_string()))?;

        let delta = CounterDelta::for_retraction(existing.vote_value);

        Vote::delete_by_id(existing.id.as_str())
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        adjust_counters(&txn, statement_id, delta).await?;
        txn.commit().await.map_err(map_db_err)?;

        delta.apply_to(&mut statement);
        debug!(statement_id, participant_id, "Vote retracted");

        Ok(statement)
    }
}

/// Lock a live statement row for the rest of the transaction.
async fn lock_statement(
    txn: &DatabaseTransaction,
    statement_id: &str,
) -> AppResult<statement::Model> {
    Statement::find_by_id(statement_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(map_db_err)?
        .filter(|s| !s.deleted)
        .ok_or_else(|| AppError::NotFound("Statement not found".to_string()))
}

async fn adjust_counters(
    txn: &DatabaseTransaction,
    statement_id: &str,
    delta: CounterDelta,
) -> AppResult<()> {
    if delta.is_zero() {
        return Ok(());
    }

    let mut update = Statement::update_many();
    for (column, by) in [
        (statement::Column::AgreeCount, delta.agree),
        (statement::Column::DisagreeCount, delta.disagree),
        (statement::Column::PassCount, delta.pass),
    ] {
        if by != 0 {
            update = update.col_expr(column, Expr::col(column).add(by));
        }
    }

    update
        .filter(statement::Column::Id.eq(statement_id))
        .exec(txn)
        .await
        .map_err(map_db_err)?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use osccai_db::entities::statement::StatementStatus;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn test_statement(agree: i32, disagree: i32, pass: i32) -> statement::Model {
        statement::Model {
            id: "s1".to_string(),
            poll_id: "p1".to_string(),
            text: "Open the library on Sundays".to_string(),
            participant_id: None,
            status: StatementStatus::Approved,
            agree_count: agree,
            disagree_count: disagree,
            pass_count: pass,
            is_constitutionable: None,
            gac_score: None,
            priority_score: None,
            last_calculated_at: None,
            deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_vote(value: VoteValue) -> vote::Model {
        vote::Model {
            id: "v1".to_string(),
            statement_id: "s1".to_string(),
            participant_id: "pa1".to_string(),
            vote_value: value,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[test]
    fn test_delta_new_vote() {
        let delta = CounterDelta::for_vote(None, VoteValue::Agree);
        assert_eq!(
            delta,
            CounterDelta {
                agree: 1,
                disagree: 0,
                pass: 0
            }
        );
    }

    #[test]
    fn test_delta_same_value_is_noop() {
        for value in [VoteValue::Agree, VoteValue::Disagree, VoteValue::Pass] {
            assert!(CounterDelta::for_vote(Some(value), value).is_zero());
        }
    }

    #[test]
    fn test_delta_change_moves_one_unit() {
        let delta = CounterDelta::for_vote(Some(VoteValue::Agree), VoteValue::Disagree);
        assert_eq!(
            delta,
            CounterDelta {
                agree: -1,
                disagree: 1,
                pass: 0
            }
        );
    }

    #[test]
    fn test_delta_retraction() {
        let delta = CounterDelta::for_retraction(VoteValue::Pass);
        assert_eq!(delta.pass, -1);
        assert_eq!(delta.agree + delta.disagree, 0);
    }

    #[test]
    fn test_counters_match_rows_over_sequence() {
        use std::collections::HashMap;

        // Replay a sequence of operations against an in-memory ledger and
        // check counters against the surviving rows after every step.
        let mut rows: HashMap<&str, VoteValue> = HashMap::new();
        let mut statement = test_statement(0, 0, 0);

        let ops: &[(&str, Option<VoteValue>)] = &[
            ("p1", Some(VoteValue::Agree)),
            ("p2", Some(VoteValue::Agree)),
            ("p1", Some(VoteValue::Disagree)),
            ("p3", Some(VoteValue::Pass)),
            ("p2", Some(VoteValue::Agree)),
            ("p3", None),
            ("p1", Some(VoteValue::Pass)),
            ("p2", None),
            ("p4", Some(VoteValue::Disagree)),
        ];

        for &(participant, op) in ops {
            let delta = match op {
                Some(value) => {
                    let delta = CounterDelta::for_vote(rows.get(participant).copied(), value);
                    rows.insert(participant, value);
                    delta
                }
                None => {
                    let old = rows.remove(participant).unwrap();
                    CounterDelta::for_retraction(old)
                }
            };
            delta.apply_to(&mut statement);

            let count = |v| rows.values().filter(|x| **x == v).count() as i32;
            assert_eq!(statement.agree_count, count(VoteValue::Agree));
            assert_eq!(statement.disagree_count, count(VoteValue::Disagree));
            assert_eq!(statement.pass_count, count(VoteValue::Pass));
        }
    }

    #[tokio::test]
    async fn test_apply_vote_creates_and_increments() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_statement(0, 0, 0)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[test_vote(VoteValue::Agree)]])
                .append_exec_results([exec_ok()])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let result = engine
            .apply_vote("s1", "pa1", VoteValue::Agree)
            .await
            .unwrap();

        assert_eq!(result.outcome, VoteOutcome::Created);
        assert_eq!(result.statement.agree_count, 1);
        assert_eq!(result.statement.disagree_count, 0);
        assert_eq!(result.vote.vote_value, VoteValue::Agree);
    }

    #[tokio::test]
    async fn test_apply_same_vote_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_statement(1, 0, 0)]])
                .append_query_results([[test_vote(VoteValue::Agree)]])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let result = engine
            .apply_vote("s1", "pa1", VoteValue::Agree)
            .await
            .unwrap();

        assert_eq!(result.outcome, VoteOutcome::Unchanged);
        assert_eq!(result.statement.agree_count, 1);
        assert_eq!(result.vote.id, "v1");
    }

    #[tokio::test]
    async fn test_apply_changed_vote_moves_counter() {
        let mut changed = test_vote(VoteValue::Disagree);
        changed.updated_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_statement(1, 0, 0)]])
                .append_query_results([[test_vote(VoteValue::Agree)]])
                .append_query_results([[changed]])
                .append_exec_results([exec_ok()])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let result = engine
            .apply_vote("s1", "pa1", VoteValue::Disagree)
            .await
            .unwrap();

        assert_eq!(result.outcome, VoteOutcome::Changed);
        assert_eq!(result.statement.agree_count, 0);
        assert_eq!(result.statement.disagree_count, 1);
        assert_eq!(result.statement.pass_count, 0);
    }

    #[tokio::test]
    async fn test_apply_vote_on_missing_statement() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<statement::Model>::new()])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let err = engine
            .apply_vote("missing", "pa1", VoteValue::Pass)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg == "Statement not found"));
    }

    #[tokio::test]
    async fn test_apply_vote_on_deleted_statement() {
        let mut deleted = test_statement(0, 0, 0);
        deleted.deleted = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[deleted]])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let err = engine
            .apply_vote("s1", "pa1", VoteValue::Agree)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_retract_vote_decrements() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_statement(0, 2, 0)]])
                .append_query_results([[test_vote(VoteValue::Disagree)]])
                .append_exec_results([exec_ok(), exec_ok()])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let statement = engine.retract_vote("s1", "pa1").await.unwrap();

        assert_eq!(statement.disagree_count, 1);
        assert_eq!(statement.agree_count, 0);
    }

    #[tokio::test]
    async fn test_retract_missing_vote() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_statement(0, 0, 0)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );

        let engine = TallyEngine::new(db);
        let err = engine.retract_vote("s1", "pa1").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg == "Vote not found"));
    }
}
