//! System event repository.

use std::sync::Arc;

use crate::entities::{
    SystemEvent,
    system_event::{self, EventType, ResourceType},
};
use osccai_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Filters for listing events. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Kind of record.
    pub resource_type: Option<ResourceType>,
    /// Record id.
    pub resource_id: Option<String>,
    /// Owning community model.
    pub community_model_id: Option<String>,
    /// Any of these event types.
    pub event_types: Vec<EventType>,
    /// Restrict to events this actor performed or that belong to these models.
    pub visible_to: Option<(String, Vec<String>)>,
    /// Maximum number of events returned.
    pub limit: u64,
}

/// System event repository for database operations.
#[derive(Clone)]
pub struct SystemEventRepository {
    db: Arc<DatabaseConnection>,
}

impl SystemEventRepository {
    /// Create a new system event repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append an event.
    pub async fn create(
        &self,
        model: system_event::ActiveModel,
    ) -> AppResult<system_event::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Events matching `filter`, newest first.
    pub async fn find(&self, filter: &EventFilter) -> AppResult<Vec<system_event::Model>> {
        let mut query = SystemEvent::find().order_by_desc(system_event::Column::CreatedAt);

        if let Some(resource_type) = filter.resource_type {
            query = query.filter(system_event::Column::ResourceType.eq(resource_type));
        }
        if let Some(resource_id) = &filter.resource_id {
            query = query.filter(system_event::Column::ResourceId.eq(resource_id.as_str()));
        }
        if let Some(model_id) = &filter.community_model_id {
            query = query.filter(system_event::Column::CommunityModelId.eq(model_id.as_str()));
        }
        if !filter.event_types.is_empty() {
            query = query.filter(system_event::Column::EventType.is_in(filter.event_types.clone()));
        }
        if let Some((actor_id, model_ids)) = &filter.visible_to {
            let mut visible =
                Condition::any().add(system_event::Column::ActorId.eq(actor_id.as_str()));
            if !model_ids.is_empty() {
                visible =
                    visible.add(system_event::Column::CommunityModelId.is_in(model_ids.clone()));
            }
            query = query.filter(visible);
        }

        query
            .limit(filter.limit)
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
    use sea_orm::{DatabaseBackend, MockDatabase, Set};

    fn create_test_event(id: &str, event_type: EventType) -> system_event::Model {
        system_event::Model {
            id: id.to_string(),
            event_type,
            resource_type: ResourceType::Vote,
            resource_id: "v1".to_string(),
            community_model_id: Some("m1".to_string()),
            actor_id: "pa1".to_string(),
            actor_name: None,
            is_admin_action: false,
            metadata: serde_json::json!({ "voteValue": "AGREE" }),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_create() {
        let event = create_test_event("e1", EventType::VoteCast);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[event.clone()]])
                .into_connection(),
        );
        let repo = SystemEventRepository::new(db);

        let created = repo
            .create(system_event::ActiveModel {
                id: Set(event.id.clone()),
                event_type: Set(event.event_type),
                resource_type: Set(event.resource_type),
                resource_id: Set(event.resource_id.clone()),
                community_model_id: Set(event.community_model_id.clone()),
                actor_id: Set(event.actor_id.clone()),
                actor_name: Set(None),
                is_admin_action: Set(false),
                metadata: Set(event.metadata.clone()),
                created_at: Set(event.created_at),
            })
            .await
            .unwrap();
        assert_eq!(created, event);
    }

    #[tokio::test]
    async fn test_find_with_visibility() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_event("e1", EventType::VoteCast)]])
                .into_connection(),
        );
        let repo = SystemEventRepository::new(db);

        let events = repo
            .find(&EventFilter {
                event_types: vec![EventType::VoteCast, EventType::StatementAdded],
                visible_to: Some(("u1".to_string(), vec!["m1".to_string()])),
                limit: 10,
                ..EventFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::VoteCast);
    }
}
