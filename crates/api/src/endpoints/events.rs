//! System event log endpoint.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use osccai_common::AppResult;
use osccai_core::EventQuery;
use osccai_db::entities::system_event::{self, EventType, ResourceType};
use serde::Serialize;
use serde_json::Value;

use crate::{extractors::ManagerAuth, middleware::AppState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub uid: String,
    pub event_type: EventType,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub community_model_id: Option<String>,
    pub actor_id: String,
    pub actor_name: Option<String>,
    pub is_admin_action: bool,
    pub metadata: Value,
    pub created_at: String,
}

impl From<system_event::Model> for EventResponse {
    fn from(e: system_event::Model) -> Self {
        Self {
            uid: e.id,
            event_type: e.event_type,
            resource_type: e.resource_type,
            resource_id: e.resource_id,
            community_model_id: e.community_model_id,
            actor_id: e.actor_id,
            actor_name: e.actor_name,
            is_admin_action: e.is_admin_action,
            metadata: e.metadata,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

/// Newest events visible to the caller, filtered by the query string.
async fn list_events(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let events = state.event_service.list(&manager, query).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(list_events))
}
