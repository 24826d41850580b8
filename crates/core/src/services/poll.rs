//! Poll service.

use std::collections::HashMap;

use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{
    entities::{
        community_model, poll,
        statement::{self, StatementStatus},
        system_event::EventType,
        vote::VoteValue,
    },
    repositories::{CommunityModelRepository, PollRepository, StatementRepository, VoteRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::{
    access::Manager,
    eligibility,
    event::{Actor, EventService},
    participant::{ParticipantIdentity, ParticipantService},
    tally::{TallyEngine, VoteOutcome, VoteResult},
};

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    statement_repo: StatementRepository,
    vote_repo: VoteRepository,
    model_repo: CommunityModelRepository,
    participants: ParticipantService,
    tally: TallyEngine,
    events: EventService,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    pub require_auth: bool,
    #[serde(default = "default_true")]
    pub allow_participant_statements: bool,
    #[validate(range(min = 1))]
    pub max_votes_per_participant: Option<i32>,
    #[validate(range(min = 0))]
    pub min_votes_before_submission: Option<i32>,
    #[validate(range(min = 1))]
    pub max_submissions_per_participant: Option<i32>,
    #[validate(range(min = 0))]
    pub min_required_submissions: Option<i32>,
    #[validate(length(max = 2000))]
    pub completion_message: Option<String>,
    /// Seed statements authored by the poll owner.
    #[serde(default)]
    pub statements: Vec<String>,
}

const fn default_true() -> bool {
    true
}

/// A statement with its derived eligibility.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementView {
    #[serde(flatten)]
    pub statement: statement::Model,
    pub constitutionable: bool,
    pub agreement_percentage: f64,
}

impl From<statement::Model> for StatementView {
    fn from(statement: statement::Model) -> Self {
        Self {
            constitutionable: eligibility::is_constitutionable(&statement),
            agreement_percentage: eligibility::agreement_percentage(
                statement.agree_count,
                statement.disagree_count,
                statement.pass_count,
            ),
            statement,
        }
    }
}

/// Poll with statements and the caller's votes.
#[derive(Debug, Clone)]
pub struct PollView {
    pub poll: poll::Model,
    pub community_model: community_model::Model,
    pub statements: Vec<StatementView>,
    /// Caller's vote per statement id.
    pub participant_votes: HashMap<String, VoteValue>,
}

/// Completion state of a poll for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatus {
    pub is_complete: bool,
    pub message: Option<String>,
    pub required_submissions: Option<i32>,
    pub current_submissions: u64,
    pub votes_cast: u64,
}

fn limit_reached(count: u64, limit: Option<i32>) -> bool {
    limit.is_some_and(|max| count >= u64::try_from(max.max(0)).unwrap_or(0))
}

fn below_minimum(count: u64, minimum: Option<i32>) -> bool {
    minimum.is_some_and(|min| count < u64::try_from(min.max(0)).unwrap_or(0))
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        statement_repo: StatementRepository,
        vote_repo: VoteRepository,
        model_repo: CommunityModelRepository,
        participants: ParticipantService,
        tally: TallyEngine,
        events: EventService,
    ) -> Self {
        Self {
            poll_repo,
            statement_repo,
            vote_repo,
            model_repo,
            participants,
            tally,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a live poll.
    pub async fn get_poll(&self, poll_id: &str) -> AppResult<poll::Model> {
        self.poll_repo.get_by_id(poll_id).await
    }

    /// Get a live poll together with its community model.
    pub async fn get_poll_with_model(
        &self,
        poll_id: &str,
    ) -> AppResult<(poll::Model, community_model::Model)> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let model = self.model_repo.get_by_id(&poll.community_model_id).await?;
        Ok((poll, model))
    }

    /// Get a live statement that belongs to the given poll.
    pub async fn get_statement_in_poll(
        &self,
        poll_id: &str,
        statement_id: &str,
    ) -> AppResult<statement::Model> {
        let statement = self.statement_repo.get_by_id(statement_id).await?;
        if statement.poll_id != poll_id {
            return Err(AppError::NotFound("Statement not found".to_string()));
        }
        Ok(statement)
    }

    /// Create a draft poll in a community model.
    pub async fn create_poll(
        &self,
        manager: &Manager,
        community_model_id: &str,
        input: CreatePollInput,
    ) -> AppResult<poll::Model> {
        input.validate()?;
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if input.statements.iter().any(|s| s.trim().is_empty()) {
            return Err(AppError::Validation(
                "Statements cannot be empty".to_string(),
            ));
        }

        let model = self.model_repo.get_by_id(community_model_id).await?;
        manager.authorize(&model)?;

        let now = Utc::now();
        let poll = self
            .poll_repo
            .create(poll::ActiveModel {
                id: Set(self.id_gen.generate()),
                community_model_id: Set(community_model_id.to_string()),
                title: Set(input.title.trim().to_string()),
                description: Set(input.description),
                published: Set(false),
                require_auth: Set(input.require_auth),
                allow_participant_statements: Set(input.allow_participant_statements),
                max_votes_per_participant: Set(input.max_votes_per_participant),
                min_votes_before_submission: Set(input.min_votes_before_submission),
                max_submissions_per_participant: Set(input.max_submissions_per_participant),
                min_required_submissions: Set(input.min_required_submissions),
                completion_message: Set(input.completion_message),
                deleted: Set(false),
                created_at: Set(now.into()),
                updated_at: Set(None),
            })
            .await?;

        for text in input.statements {
            self.statement_repo
                .create(self.new_statement(&poll.id, text.trim(), None, StatementStatus::Approved))
                .await?;
        }

        info!(poll_id = %poll.id, community_model_id, "Created poll");
        self.events
            .poll_changed(EventType::PollCreated, &poll, "created", Actor::manager(manager))
            .await;
        Ok(poll)
    }

    /// Publish a draft poll. A poll without statements cannot be published.
    pub async fn publish_poll(&self, manager: &Manager, poll_id: &str) -> AppResult<poll::Model> {
        let poll = self.managed_poll(manager, poll_id).await?;
        if poll.published {
            return Ok(poll);
        }

        if self.statement_repo.count_by_poll(poll_id).await? == 0 {
            return Err(AppError::BadRequest(
                "Cannot publish a poll without statements".to_string(),
            ));
        }

        let mut active: poll::ActiveModel = poll.into();
        active.published = Set(true);
        active.updated_at = Set(Some(Utc::now().into()));
        let published = self.poll_repo.update(active).await?;

        self.events
            .poll_changed(EventType::PollUpdated, &published, "published", Actor::manager(manager))
            .await;
        Ok(published)
    }

    /// Soft-delete a poll and its statements.
    pub async fn delete_poll(&self, manager: &Manager, poll_id: &str) -> AppResult<()> {
        let poll = self.managed_poll(manager, poll_id).await?;

        let mut active: poll::ActiveModel = poll.into();
        active.deleted = Set(true);
        active.updated_at = Set(Some(Utc::now().into()));
        let deleted = self.poll_repo.update(active).await?;

        let statements = self.statement_repo.soft_delete_by_poll(poll_id).await?;
        info!(poll_id, statements, "Deleted poll");
        self.events
            .poll_changed(EventType::PollUpdated, &deleted, "deleted", Actor::manager(manager))
            .await;
        Ok(())
    }

    /// Soft-delete one statement of a poll.
    pub async fn delete_statement(
        &self,
        manager: &Manager,
        poll_id: &str,
        statement_id: &str,
    ) -> AppResult<()> {
        self.managed_poll(manager, poll_id).await?;
        self.get_statement_in_poll(poll_id, statement_id).await?;
        self.statement_repo.soft_delete(statement_id).await?;
        Ok(())
    }

    /// Live statements with eligibility, and the caller's votes, for a poll
    /// loaded with [`Self::get_poll_with_model`].
    pub async fn poll_view(
        &self,
        poll: poll::Model,
        community_model: community_model::Model,
        participant_id: Option<&str>,
    ) -> AppResult<PollView> {
        let poll_id = poll.id.as_str();
        let statements = self
            .statement_repo
            .find_by_poll(poll_id)
            .await?
            .into_iter()
            .filter(|s| s.status != StatementStatus::Rejected)
            .map(StatementView::from)
            .collect();

        let participant_votes = match participant_id {
            Some(participant_id) => self
                .vote_repo
                .find_by_participant_in_poll(participant_id, poll_id)
                .await?
                .into_iter()
                .map(|v| (v.statement_id, v.vote_value))
                .collect(),
            None => HashMap::new(),
        };

        Ok(PollView {
            poll,
            community_model,
            statements,
            participant_votes,
        })
    }

    /// Submit a participant statement, enforcing the poll's submission rules.
    pub async fn submit_statement(
        &self,
        poll_id: &str,
        identity: &ParticipantIdentity,
        text: &str,
    ) -> AppResult<statement::Model> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Content is required".to_string()));
        }

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let participant = self.participants.get_or_create(identity).await?;

        if !poll.allow_participant_statements {
            return Err(AppError::Forbidden(
                "Participant statements are not allowed in this poll".to_string(),
            ));
        }

        if let Some(min_votes) = poll.min_votes_before_submission.filter(|n| *n > 0) {
            let votes = self
                .vote_repo
                .count_by_participant_in_poll(&participant.id, poll_id)
                .await?;
            if below_minimum(votes, Some(min_votes)) {
                return Err(AppError::Forbidden(format!(
                    "You must vote on at least {min_votes} statements before submitting your own"
                )));
            }
        }

        if poll.max_submissions_per_participant.is_some() {
            let submissions = self
                .statement_repo
                .count_by_author_in_poll(&participant.id, poll_id)
                .await?;
            if limit_reached(submissions, poll.max_submissions_per_participant) {
                return Err(AppError::Forbidden(
                    "Maximum submissions limit reached".to_string(),
                ));
            }
        }

        let statement = self
            .statement_repo
            .create(self.new_statement(
                poll_id,
                text,
                Some(participant.id.clone()),
                StatementStatus::Pending,
            ))
            .await?;

        info!(
            poll_id,
            statement_id = %statement.id,
            participant_id = %participant.id,
            "Statement submitted"
        );
        self.events
            .statement_added(
                &statement,
                &poll.community_model_id,
                Actor::participant(&participant.id),
            )
            .await;
        Ok(statement)
    }

    /// Cast or change a vote on a statement of a poll.
    ///
    /// The vote limit only applies to new votes; changing an existing vote is
    /// always allowed.
    pub async fn cast_vote(
        &self,
        poll_id: &str,
        statement_id: &str,
        identity: &ParticipantIdentity,
        value: VoteValue,
    ) -> AppResult<VoteResult> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        self.get_statement_in_poll(poll_id, statement_id).await?;
        let participant = self.participants.get_or_create(identity).await?;

        if poll.max_votes_per_participant.is_some() {
            let existing = self
                .vote_repo
                .find_by_statement_and_participant(statement_id, &participant.id)
                .await?;
            if existing.is_none() {
                let cast = self
                    .vote_repo
                    .count_by_participant_in_poll(&participant.id, poll_id)
                    .await?;
                if limit_reached(cast, poll.max_votes_per_participant) {
                    return Err(AppError::Forbidden(
                        "Maximum votes limit reached".to_string(),
                    ));
                }
            }
        }

        let result = self
            .tally
            .apply_vote(statement_id, &participant.id, value)
            .await?;

        if result.outcome != VoteOutcome::Unchanged {
            self.events
                .vote_cast(&result.vote, poll_id, &poll.community_model_id)
                .await;
        }
        Ok(result)
    }

    /// Retract a participant's vote on a statement of a poll.
    pub async fn retract_vote(
        &self,
        poll_id: &str,
        statement_id: &str,
        identity: &ParticipantIdentity,
    ) -> AppResult<statement::Model> {
        self.poll_repo.get_by_id(poll_id).await?;
        self.get_statement_in_poll(poll_id, statement_id).await?;
        let participant = self
            .participants
            .find(identity)
            .await?
            .ok_or_else(|| AppError::NotFound("Vote not found".to_string()))?;

        self.tally.retract_vote(statement_id, &participant.id).await
    }

    /// Whether a participant has completed a poll.
    ///
    /// A poll is complete once the participant reached the vote limit (or
    /// voted on every statement when there is no limit) and submitted the
    /// minimum number of statements.
    pub async fn completion_status(
        &self,
        poll_id: &str,
        identity: &ParticipantIdentity,
    ) -> AppResult<CompletionStatus> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let participant = self.participants.find(identity).await?;

        let (votes_cast, submissions) = match &participant {
            Some(p) => (
                self.vote_repo
                    .count_by_participant_in_poll(&p.id, poll_id)
                    .await?,
                self.statement_repo
                    .count_by_author_in_poll(&p.id, poll_id)
                    .await?,
            ),
            None => (0, 0),
        };

        let reached_vote_limit = match poll.max_votes_per_participant {
            Some(_) => limit_reached(votes_cast, poll.max_votes_per_participant),
            None => votes_cast >= self.statement_repo.count_by_poll(poll_id).await?,
        };
        let met_submissions = !below_minimum(submissions, poll.min_required_submissions);

        let is_complete = reached_vote_limit && met_submissions;
        Ok(CompletionStatus {
            is_complete,
            message: poll.completion_message.filter(|_| is_complete),
            required_submissions: poll.min_required_submissions,
            current_submissions: submissions,
            votes_cast,
        })
    }

    async fn managed_poll(&self, manager: &Manager, poll_id: &str) -> AppResult<poll::Model> {
        let (poll, model) = self.get_poll_with_model(poll_id).await?;
        manager.authorize(&model)?;
        Ok(poll)
    }

    fn new_statement(
        &self,
        poll_id: &str,
        text: &str,
        participant_id: Option<String>,
        status: StatementStatus,
    ) -> statement::ActiveModel {
        statement::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll_id.to_string()),
            text: Set(text.to_string()),
            participant_id: Set(participant_id),
            status: Set(status),
            agree_count: Set(0),
            disagree_count: Set(0),
            pass_count: Set(0),
            is_constitutionable: Set(None),
            gac_score: Set(None),
            priority_score: Set(None),
            last_calculated_at: Set(None),
            deleted: Set(false),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
    }
}
