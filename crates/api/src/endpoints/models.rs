//! Community model endpoints: polls, constitutions and API keys.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use osccai_common::AppResult;
use osccai_core::{CreatePollInput, CreatedApiKey};
use osccai_db::entities::{
    api_key,
    constitution::{self, ConstitutionStatus},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::polls::PollSummary;
use crate::{
    extractors::{Caller, JsonBody, ManagerAuth},
    middleware::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstitutionResponse {
    pub uid: String,
    pub community_model_id: String,
    pub version: i32,
    pub content: String,
    pub status: ConstitutionStatus,
    pub created_at: String,
}

impl From<constitution::Model> for ConstitutionResponse {
    fn from(c: constitution::Model) -> Self {
        Self {
            uid: c.id,
            community_model_id: c.community_model_id,
            version: c.version,
            content: c.content,
            status: c.status,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub uid: String,
    pub name: String,
    pub community_model_id: String,
    pub enabled: bool,
    pub last_used_at: Option<String>,
    pub created_at: String,
    /// Only present in the creation response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl From<api_key::Model> for ApiKeyResponse {
    fn from(k: api_key::Model) -> Self {
        Self {
            uid: k.id,
            name: k.name,
            community_model_id: k.community_model_id,
            enabled: k.enabled,
            last_used_at: k.last_used_at.map(|t| t.to_rfc3339()),
            created_at: k.created_at.to_rfc3339(),
            key: None,
        }
    }
}

impl From<CreatedApiKey> for ApiKeyResponse {
    fn from(created: CreatedApiKey) -> Self {
        Self {
            key: Some(created.raw_key),
            ..created.key.into()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

/// Generate and activate a new constitution from the model's eligible statements.
async fn create_constitution(
    caller: Caller,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<Json<ConstitutionResponse>> {
    let model = state.constitution_service.get_model(&model_id).await?;
    caller.require_model_access(&model.id, &model.owner_id)?;

    let constitution = state
        .constitution_service
        .create_and_activate(&model_id)
        .await?;
    Ok(Json(constitution.into()))
}

async fn list_constitutions(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<Json<Vec<ConstitutionResponse>>> {
    let constitutions = state
        .constitution_service
        .list(&manager, &model_id)
        .await?;
    Ok(Json(constitutions.into_iter().map(Into::into).collect()))
}

async fn draft_constitution(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<Json<ConstitutionResponse>> {
    let constitution = state
        .constitution_service
        .generate_draft(&manager, &model_id)
        .await?;
    Ok(Json(constitution.into()))
}

async fn activate_constitution(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path((model_id, constitution_id)): Path<(String, String)>,
) -> AppResult<Json<ConstitutionResponse>> {
    let constitution = state
        .constitution_service
        .activate(&manager, &model_id, &constitution_id)
        .await?;
    Ok(Json(constitution.into()))
}

/// Create a draft poll, optionally seeded with statements.
async fn create_poll(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    JsonBody(input): JsonBody<CreatePollInput>,
) -> AppResult<Json<PollSummary>> {
    let poll = state
        .poll_service
        .create_poll(&manager, &model_id, input)
        .await?;
    Ok(Json(poll.into()))
}

async fn list_api_keys(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<Json<Vec<ApiKeyResponse>>> {
    let keys = state.api_key_service.list_keys(&manager, &model_id).await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Issue a key. The raw key is only ever returned here.
async fn create_api_key(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    JsonBody(req): JsonBody<CreateApiKeyRequest>,
) -> AppResult<Json<ApiKeyResponse>> {
    let created = state
        .api_key_service
        .create_key(&manager, &model_id, &req.name)
        .await?;
    Ok(Json(created.into()))
}

async fn revoke_api_key(
    ManagerAuth(manager): ManagerAuth,
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> AppResult<Json<Value>> {
    state.api_key_service.revoke_key(&manager, &key_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{model_id}/constitutions",
            post(create_constitution).get(list_constitutions),
        )
        .route("/{model_id}/constitutions/draft", post(draft_constitution))
        .route(
            "/{model_id}/constitutions/{constitution_id}/activate",
            post(activate_constitution),
        )
        .route("/{model_id}/polls", post(create_poll))
        .route(
            "/{model_id}/api-keys",
            get(list_api_keys).post(create_api_key),
        )
}

pub fn api_keys_router() -> Router<AppState> {
    Router::new().route("/{key_id}", delete(revoke_api_key))
}
