//! Poll, statement and vote endpoints.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use osccai_common::{AppError, AppResult};
use osccai_core::{CompletionStatus, PollView, StatementView, VoteOutcome};
use osccai_db::entities::{
    community_model, poll,
    statement::{self, StatementStatus},
    vote::VoteValue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    extractors::{Caller, JsonBody, ManagerAuth, OptionalJsonBody},
    middleware::AppState,
};

/// Community model summary embedded in poll responses.
#[derive(Serialize)]
pub struct ModelSummary {
    pub uid: String,
    pub name: String,
}

impl From<&community_model::Model> for ModelSummary {
    fn from(m: &community_model::Model) -> Self {
        Self {
            uid: m.id.clone(),
            name: m.name.clone(),
        }
    }
}

/// Statement with tallies and derived eligibility.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    pub uid: String,
    pub text: String,
    pub status: StatementStatus,
    pub agree_count: i32,
    pub disagree_count: i32,
    pub pass_count: i32,
    pub is_constitutionable: bool,
    pub agreement_percentage: f64,
    pub gac_score: Option<f64>,
    pub priority_score: Option<f64>,
    pub last_calculated_at: Option<String>,
    pub created_at: String,
}

impl From<StatementView> for StatementResponse {
    fn from(view: StatementView) -> Self {
        let s = view.statement;
        Self {
            uid: s.id,
            text: s.text,
            status: s.status,
            agree_count: s.agree_count,
            disagree_count: s.disagree_count,
            pass_count: s.pass_count,
            is_constitutionable: view.constitutionable,
            agreement_percentage: view.agreement_percentage,
            gac_score: s.gac_score,
            priority_score: s.priority_score,
            last_calculated_at: s.last_calculated_at.map(|t| t.to_rfc3339()),
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

/// Poll with statements and the caller's votes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub require_auth: bool,
    pub allow_participant_statements: bool,
    pub community_model: ModelSummary,
    pub statements: Vec<StatementResponse>,
    /// Caller's vote per statement uid.
    pub votes: HashMap<String, VoteValue>,
}

impl From<PollView> for PollResponse {
    fn from(view: PollView) -> Self {
        Self {
            uid: view.poll.id,
            title: view.poll.title,
            description: view.poll.description,
            published: view.poll.published,
            require_auth: view.poll.require_auth,
            allow_participant_statements: view.poll.allow_participant_statements,
            community_model: ModelSummary::from(&view.community_model),
            statements: view.statements.into_iter().map(Into::into).collect(),
            votes: view.participant_votes,
        }
    }
}

/// Poll settings as seen by its managers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub uid: String,
    pub community_model_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub require_auth: bool,
    pub allow_participant_statements: bool,
    pub max_votes_per_participant: Option<i32>,
    pub min_votes_before_submission: Option<i32>,
    pub max_submissions_per_participant: Option<i32>,
    pub min_required_submissions: Option<i32>,
    pub completion_message: Option<String>,
    pub created_at: String,
}

impl From<poll::Model> for PollSummary {
    fn from(p: poll::Model) -> Self {
        Self {
            uid: p.id,
            community_model_id: p.community_model_id,
            title: p.title,
            description: p.description,
            published: p.published,
            require_auth: p.require_auth,
            allow_participant_statements: p.allow_participant_statements,
            max_votes_per_participant: p.max_votes_per_participant,
            min_votes_before_submission: p.min_votes_before_submission,
            max_submissions_per_participant: p.max_submissions_per_participant,
            min_required_submissions: p.min_required_submissions,
            completion_message: p.completion_message,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Newly submitted statement.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedStatementResponse {
    pub uid: String,
    pub text: String,
    pub status: StatementStatus,
    pub created_at: String,
}

impl From<statement::Model> for CreatedStatementResponse {
    fn from(s: statement::Model) -> Self {
        Self {
            uid: s.id,
            text: s.text,
            status: s.status,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

/// Counters of a statement after a vote mutation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResponse {
    pub uid: String,
    pub agree_count: i32,
    pub disagree_count: i32,
    pub pass_count: i32,
}

impl From<&statement::Model> for TallyResponse {
    fn from(s: &statement::Model) -> Self {
        Self {
            uid: s.id.clone(),
            agree_count: s.agree_count,
            disagree_count: s.disagree_count,
            pass_count: s.pass_count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub uid: String,
    pub vote_value: VoteValue,
    pub created_at: String,
    pub outcome: VoteOutcome,
    pub statement: TallyResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPollRequest {
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStatementRequest {
    pub content: Option<String>,
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub statement_id: Option<String>,
    pub vote: Option<String>,
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetractVoteRequest {
    pub statement_id: Option<String>,
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecalculateRequest {
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionQuery {
    pub anonymous_id: Option<String>,
}

fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

/// Read a poll with its statements and the caller's votes.
async fn view_poll(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    OptionalJsonBody(req): OptionalJsonBody<ViewPollRequest>,
) -> AppResult<Json<PollResponse>> {
    let (poll, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.check_optional_key(&model.id)?;

    if poll.require_auth && !caller.has_api_key() && caller.session.is_none() {
        return Err(AppError::Unauthorized(
            "Authentication required".to_string(),
        ));
    }

    let participant = match caller.identity(req.anonymous_id.as_deref()) {
        Ok(identity) => state.participant_service.find(&identity).await?,
        Err(_) => None,
    };

    let view = state
        .poll_service
        .poll_view(poll, model, participant.as_ref().map(|p| p.id.as_str()))
        .await?;
    Ok(Json(view.into()))
}

/// Submit a participant statement.
async fn submit_statement(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    JsonBody(req): JsonBody<SubmitStatementRequest>,
) -> AppResult<Json<CreatedStatementResponse>> {
    let content = required(req.content, "Content is required")?;
    let identity = caller.identity(req.anonymous_id.as_deref())?;

    let (_, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.require_key_or_session(&model.id)?;

    let statement = state
        .poll_service
        .submit_statement(&poll_id, &identity, &content)
        .await?;
    Ok(Json(statement.into()))
}

/// Cast or change a vote.
async fn cast_vote(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    JsonBody(req): JsonBody<VoteRequest>,
) -> AppResult<Json<VoteResponse>> {
    let statement_id = required(req.statement_id, "StatementId is required")?;
    let vote = required(req.vote, "Vote value is required")?;
    let identity = caller.identity(req.anonymous_id.as_deref())?;
    let value = VoteValue::from_literal(&vote)
        .ok_or_else(|| AppError::Validation("Invalid vote value".to_string()))?;

    let (_, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.require_key_or_session(&model.id)?;

    let result = state
        .poll_service
        .cast_vote(&poll_id, &statement_id, &identity, value)
        .await?;

    Ok(Json(VoteResponse {
        uid: result.vote.id,
        vote_value: result.vote.vote_value,
        created_at: result.vote.created_at.to_rfc3339(),
        outcome: result.outcome,
        statement: TallyResponse::from(&result.statement),
    }))
}

/// Retract a vote.
async fn retract_vote(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    JsonBody(req): JsonBody<RetractVoteRequest>,
) -> AppResult<Json<Value>> {
    let statement_id = required(req.statement_id, "StatementId is required")?;
    let identity = caller.identity(req.anonymous_id.as_deref())?;

    let (_, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.require_key_or_session(&model.id)?;

    let statement = state
        .poll_service
        .retract_vote(&poll_id, &statement_id, &identity)
        .await?;

    Ok(Json(json!({
        "success": true,
        "statement": TallyResponse::from(&statement),
    })))
}

/// Ask the scoring service to recompute a poll's scores.
async fn recalculate(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    OptionalJsonBody(req): OptionalJsonBody<RecalculateRequest>,
) -> AppResult<Json<Value>> {
    let (_, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.require_model_access(&model.id, &model.owner_id)?;

    let response = state
        .scoring_service
        .recalculate_poll(&poll_id, req.force.unwrap_or(false))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Score recalculation requested",
        "upstream": response.upstream,
    })))
}

/// Completion state of the poll for the caller.
async fn completion(
    caller: Caller,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Query(query): Query<CompletionQuery>,
) -> AppResult<Json<CompletionStatus>> {
    let identity = caller.identity(query.anonymous_id.as_deref())?;

    let (_, model) = state.poll_service.get_poll_with_model(&poll_id).await?;
    caller.check_optional_key(&model.id)?;

    let status = state
        .poll_service
        .completion_status(&poll_id, &identity)
        .await?;
    Ok(Json(status))
}

async fn publish_poll(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<PollSummary>> {
    let poll = state.poll_service.publish_poll(&manager, &poll_id).await?;
    Ok(Json(poll.into()))
}

async fn delete_poll(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<Value>> {
    state.poll_service.delete_poll(&manager, &poll_id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn delete_statement(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path((poll_id, statement_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    state
        .poll_service
        .delete_statement(&manager, &poll_id, &statement_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{poll_id}", post(view_poll).delete(delete_poll))
        .route("/{poll_id}/statements", post(submit_statement))
        .route(
            "/{poll_id}/statements/{statement_id}",
            delete(delete_statement),
        )
        .route("/{poll_id}/votes", post(cast_vote).delete(retract_vote))
        .route("/{poll_id}/recalculate", post(recalculate))
        .route("/{poll_id}/completion", get(completion))
        .route("/{poll_id}/publish", post(publish_poll))
}
