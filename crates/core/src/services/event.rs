//! System event log.
//!
//! Recording never fails the operation that triggered it: a failed insert
//! is logged and dropped.

use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{
    entities::{
        api_key, constitution, poll, statement,
        system_event::{self, EventType, ResourceType},
        vote,
    },
    repositories::{CommunityModelRepository, EventFilter, SystemEventRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::access::Manager;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

/// Who caused an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: Option<String>,
    pub is_admin: bool,
}

impl Actor {
    /// Scheduled jobs and inbound webhooks.
    #[must_use]
    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            name: Some("System".to_string()),
            is_admin: true,
        }
    }

    #[must_use]
    pub fn manager(manager: &Manager) -> Self {
        match manager {
            Manager::Admin => Self {
                id: "admin".to_string(),
                name: Some("Admin".to_string()),
                is_admin: true,
            },
            Manager::Owner(user_id) => Self {
                id: user_id.clone(),
                name: None,
                is_admin: false,
            },
        }
    }

    #[must_use]
    pub fn participant(participant_id: &str) -> Self {
        Self {
            id: participant_id.to_string(),
            name: None,
            is_admin: false,
        }
    }
}

/// An event to append.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub community_model_id: Option<String>,
    pub actor: Actor,
    pub metadata: Value,
}

/// Query string of the event listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub limit: Option<u64>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub community_model_id: Option<String>,
    /// Comma separated event types, e.g. `VOTE_CAST,STATEMENT_ADDED`.
    pub event_types: Option<String>,
}

impl EventQuery {
    fn into_filter(self) -> AppResult<EventFilter> {
        let resource_type = self
            .resource_type
            .filter(|t| !t.is_empty())
            .map(|t| {
                ResourceType::from_literal(&t)
                    .ok_or_else(|| AppError::Validation(format!("Unknown resource type: {t}")))
            })
            .transpose()?;

        let event_types = self
            .event_types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                EventType::from_literal(t)
                    .ok_or_else(|| AppError::Validation(format!("Unknown event type: {t}")))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(EventFilter {
            resource_type,
            resource_id: self.resource_id.filter(|id| !id.is_empty()),
            community_model_id: self.community_model_id.filter(|id| !id.is_empty()),
            event_types,
            visible_to: None,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        })
    }
}

/// Appends and lists system events.
#[derive(Clone)]
pub struct EventService {
    repo: SystemEventRepository,
    model_repo: CommunityModelRepository,
    id_gen: IdGenerator,
}

impl EventService {
    #[must_use]
    pub const fn new(repo: SystemEventRepository, model_repo: CommunityModelRepository) -> Self {
        Self {
            repo,
            model_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Append an event, logging instead of failing when the insert fails.
    pub async fn record(&self, event: NewEvent) {
        let event_type = event.event_type;
        let result = self
            .repo
            .create(system_event::ActiveModel {
                id: Set(self.id_gen.generate()),
                event_type: Set(event.event_type),
                resource_type: Set(event.resource_type),
                resource_id: Set(event.resource_id),
                community_model_id: Set(event.community_model_id),
                actor_id: Set(event.actor.id),
                actor_name: Set(event.actor.name),
                is_admin_action: Set(event.actor.is_admin),
                metadata: Set(event.metadata),
                created_at: Set(Utc::now().into()),
            })
            .await;

        match result {
            Ok(stored) => debug!(event_id = %stored.id, ?event_type, "Recorded system event"),
            Err(e) => warn!(?event_type, error = %e, "Failed to record system event"),
        }
    }

    pub async fn vote_cast(&self, vote: &vote::Model, poll_id: &str, community_model_id: &str) {
        self.record(NewEvent {
            event_type: EventType::VoteCast,
            resource_type: ResourceType::Vote,
            resource_id: vote.id.clone(),
            community_model_id: Some(community_model_id.to_string()),
            actor: Actor::participant(&vote.participant_id),
            metadata: json!({
                "statementId": vote.statement_id,
                "pollId": poll_id,
                "voteValue": vote.vote_value.as_str(),
            }),
        })
        .await;
    }

    pub async fn statement_added(
        &self,
        statement: &statement::Model,
        community_model_id: &str,
        actor: Actor,
    ) {
        self.record(NewEvent {
            event_type: EventType::StatementAdded,
            resource_type: ResourceType::Statement,
            resource_id: statement.id.clone(),
            community_model_id: Some(community_model_id.to_string()),
            actor,
            metadata: json!({ "pollId": statement.poll_id, "text": statement.text }),
        })
        .await;
    }

    pub async fn gac_score_updated(
        &self,
        statement_id: &str,
        poll: &poll::Model,
        old_score: Option<f64>,
        new_score: f64,
    ) {
        self.record(NewEvent {
            event_type: EventType::GacScoreUpdated,
            resource_type: ResourceType::Statement,
            resource_id: statement_id.to_string(),
            community_model_id: Some(poll.community_model_id.clone()),
            actor: Actor::system(),
            metadata: json!({ "pollId": poll.id, "oldScore": old_score, "newScore": new_score }),
        })
        .await;
    }

    /// `POLL_CREATED` or `POLL_UPDATED`, with `change` naming what happened.
    pub async fn poll_changed(
        &self,
        event_type: EventType,
        poll: &poll::Model,
        change: &str,
        actor: Actor,
    ) {
        self.record(NewEvent {
            event_type,
            resource_type: ResourceType::Poll,
            resource_id: poll.id.clone(),
            community_model_id: Some(poll.community_model_id.clone()),
            actor,
            metadata: json!({
                "modelId": poll.community_model_id,
                "title": poll.title,
                "change": change,
            }),
        })
        .await;
    }

    /// `CONSTITUTION_GENERATED` or `CONSTITUTION_ACTIVATED`.
    pub async fn constitution_changed(
        &self,
        event_type: EventType,
        constitution: &constitution::Model,
        actor: Actor,
    ) {
        self.record(NewEvent {
            event_type,
            resource_type: ResourceType::Constitution,
            resource_id: constitution.id.clone(),
            community_model_id: Some(constitution.community_model_id.clone()),
            actor,
            metadata: json!({
                "modelId": constitution.community_model_id,
                "version": constitution.version,
            }),
        })
        .await;
    }

    /// `API_KEY_CREATED` or `API_KEY_REVOKED`.
    pub async fn api_key_changed(&self, event_type: EventType, key: &api_key::Model, actor: Actor) {
        self.record(NewEvent {
            event_type,
            resource_type: ResourceType::ApiKey,
            resource_id: key.id.clone(),
            community_model_id: Some(key.community_model_id.clone()),
            actor,
            metadata: json!({ "modelId": key.community_model_id, "keyName": key.name }),
        })
        .await;
    }

    /// Events visible to `manager`, newest first.
    ///
    /// Admins see everything. Owners see events they caused and events on
    /// the models they own.
    pub async fn list(
        &self,
        manager: &Manager,
        query: EventQuery,
    ) -> AppResult<Vec<system_event::Model>> {
        let mut filter = query.into_filter()?;

        if let Manager::Owner(user_id) = manager {
            let owned = self
                .model_repo
                .find_by_owner(user_id)
                .await?
                .into_iter()
                .map(|m| m.id)
                .collect();
            filter.visible_to = Some((user_id.clone(), owned));
        }

        self.repo.find(&filter).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use osccai_db::entities::community_model;
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> EventService {
        let db = Arc::new(db);
        EventService::new(
            SystemEventRepository::new(db.clone()),
            CommunityModelRepository::new(db),
        )
    }

    fn test_event(event_type: EventType) -> system_event::Model {
        system_event::Model {
            id: "e1".to_string(),
            event_type,
            resource_type: ResourceType::Poll,
            resource_id: "p1".to_string(),
            community_model_id: Some("m1".to_string()),
            actor_id: "u1".to_string(),
            actor_name: None,
            is_admin_action: false,
            metadata: json!({ "title": "Parks" }),
            created_at: Utc::now().into(),
        }
    }

    fn test_model() -> community_model::Model {
        community_model::Model {
            id: "m1".to_string(),
            owner_id: "u1".to_string(),
            name: "Riverside".to_string(),
            goal: "Shared parks".to_string(),
            bio: None,
            active_constitution_id: None,
            published: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_query_parsing() {
        let filter = EventQuery {
            limit: Some(1000),
            resource_type: Some("Poll".to_string()),
            event_types: Some("VOTE_CAST, STATEMENT_ADDED,".to_string()),
            ..EventQuery::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, MAX_LIMIT);
        assert_eq!(filter.resource_type, Some(ResourceType::Poll));
        assert_eq!(
            filter.event_types,
            vec![EventType::VoteCast, EventType::StatementAdded]
        );

        let filter = EventQuery::default().into_filter().unwrap();
        assert_eq!(filter.limit, DEFAULT_LIMIT);
        assert!(filter.event_types.is_empty());

        let err = EventQuery {
            event_types: Some("VOTE_CAST,EVERYTHING".to_string()),
            ..EventQuery::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Unknown event type: EVERYTHING"));
    }

    #[test]
    fn test_actors() {
        assert!(Actor::system().is_admin);
        assert_eq!(Actor::manager(&Manager::Admin).id, "admin");
        let owner = Actor::manager(&Manager::Owner("u1".to_string()));
        assert_eq!(owner.id, "u1");
        assert!(!owner.is_admin);
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("disk full".to_string())])
                .into_connection(),
        );

        svc.record(NewEvent {
            event_type: EventType::PollCreated,
            resource_type: ResourceType::Poll,
            resource_id: "p1".to_string(),
            community_model_id: Some("m1".to_string()),
            actor: Actor::system(),
            metadata: json!({}),
        })
        .await;
    }

    #[tokio::test]
    async fn test_owner_listing_loads_owned_models() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_model()]])
                .append_query_results([[test_event(EventType::PollCreated)]])
                .into_connection(),
        );

        let events = svc
            .list(&Manager::Owner("u1".to_string()), EventQuery::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::PollCreated);
    }

    #[tokio::test]
    async fn test_admin_listing_skips_ownership() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_event(EventType::ApiKeyRevoked)]])
                .into_connection(),
        );

        let events = svc
            .list(
                &Manager::Admin,
                EventQuery {
                    event_types: Some("API_KEY_REVOKED".to_string()),
                    ..EventQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(events[0].event_type, EventType::ApiKeyRevoked);
    }
}
