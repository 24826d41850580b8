//! API keys for integrations.
//!
//! Raw keys are shown once at creation. Only a SHA-256 digest is stored, and
//! every key is scoped to a single community model.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{
    entities::{api_key, system_event::EventType},
    repositories::{ApiKeyRepository, CommunityModelRepository},
};
use sea_orm::Set;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::{
    access::Manager,
    event::{Actor, EventService},
};

/// Prefix of every raw key.
pub const KEY_PREFIX: &str = "sk_";

/// A freshly created key together with its raw secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub key: api_key::Model,
    pub raw_key: String,
}

#[derive(Clone)]
pub struct ApiKeyService {
    api_key_repo: ApiKeyRepository,
    model_repo: CommunityModelRepository,
    events: EventService,
    id_gen: IdGenerator,
}

impl ApiKeyService {
    #[must_use]
    pub const fn new(
        api_key_repo: ApiKeyRepository,
        model_repo: CommunityModelRepository,
        events: EventService,
    ) -> Self {
        Self {
            api_key_repo,
            model_repo,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// Issue a new key for a community model.
    pub async fn create_key(
        &self,
        manager: &Manager,
        community_model_id: &str,
        name: &str,
    ) -> AppResult<CreatedApiKey> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(AppError::Validation(
                "Name must be between 1 and 100 characters".to_string(),
            ));
        }

        let model = self.model_repo.get_by_id(community_model_id).await?;
        manager.authorize(&model)?;

        let raw_key = generate_raw_key();
        let key = self
            .api_key_repo
            .create(api_key::ActiveModel {
                id: Set(self.id_gen.generate()),
                key_hash: Set(hash_key(&raw_key)),
                name: Set(name.to_string()),
                community_model_id: Set(community_model_id.to_string()),
                enabled: Set(true),
                last_used_at: Set(None),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        info!(key_id = %key.id, community_model_id, "API key created");
        self.events
            .api_key_changed(EventType::ApiKeyCreated, &key, Actor::manager(manager))
            .await;
        Ok(CreatedApiKey { key, raw_key })
    }

    /// Keys of a community model. Secrets are never returned.
    pub async fn list_keys(
        &self,
        manager: &Manager,
        community_model_id: &str,
    ) -> AppResult<Vec<api_key::Model>> {
        let model = self.model_repo.get_by_id(community_model_id).await?;
        manager.authorize(&model)?;
        self.api_key_repo.find_by_model(community_model_id).await
    }

    /// Disable a key.
    pub async fn revoke_key(&self, manager: &Manager, key_id: &str) -> AppResult<()> {
        let key = self
            .api_key_repo
            .find_by_id(key_id)
            .await?
            .ok_or_else(|| AppError::NotFound("API key not found".to_string()))?;

        let model = self.model_repo.get_by_id(&key.community_model_id).await?;
        manager.authorize(&model)?;

        if self.api_key_repo.disable(key_id).await? {
            info!(key_id, "API key revoked");
            self.events
                .api_key_changed(EventType::ApiKeyRevoked, &key, Actor::manager(manager))
                .await;
        }
        Ok(())
    }

    /// Resolve a raw key to an enabled key row.
    pub async fn authenticate(&self, raw_key: &str) -> AppResult<api_key::Model> {
        let key = self
            .api_key_repo
            .find_by_hash(&hash_key(raw_key))
            .await?
            .filter(|k| k.enabled)
            .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

        if let Err(e) = self.api_key_repo.touch_last_used(&key.id).await {
            warn!(key_id = %key.id, error = %e, "Failed to record API key use");
        }

        Ok(key)
    }
}

/// Fail unless `key` is scoped to `community_model_id`.
pub fn authorize_model(key: &api_key::Model, community_model_id: &str) -> AppResult<()> {
    if key.community_model_id == community_model_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "API key is not authorized for this community model".to_string(),
        ))
    }
}

fn generate_raw_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 24];
    rng.fill(&mut bytes);
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

fn hash_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
