//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use osccai_common::{AppError, AppResult};
use osccai_core::{
    ApiKeyService, ConstitutionService, EventService, ParticipantService, PollService,
    ScoringService, WebhookService, api_key::KEY_PREFIX, secrets_match,
};
use osccai_db::entities::api_key;
use tracing::debug;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub poll_service: PollService,
    pub participant_service: ParticipantService,
    pub api_key_service: ApiKeyService,
    pub constitution_service: ConstitutionService,
    pub scoring_service: ScoringService,
    pub webhook_service: WebhookService,
    pub event_service: EventService,
    pub sessions: Arc<dyn SessionResolver>,
    pub cron_secret: Option<String>,
    pub admin_token: Option<String>,
}

/// A signed-in first-party account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
}

/// Resolves first-party sessions from request headers.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<SessionUser>>;
}

/// Session resolver for deployments without a first-party frontend.
pub struct NoSessions;

#[async_trait]
impl SessionResolver for NoSessions {
    async fn resolve(&self, _headers: &HeaderMap) -> AppResult<Option<SessionUser>> {
        Ok(None)
    }
}

/// Reads the account id from a header set by a trusted frontend proxy.
pub struct HeaderSessions {
    header: HeaderName,
}

impl HeaderSessions {
    pub fn new(header: &str) -> AppResult<Self> {
        let header = HeaderName::try_from(header)
            .map_err(|e| AppError::Config(format!("Invalid session header name: {e}")))?;
        Ok(Self { header })
    }
}

#[async_trait]
impl SessionResolver for HeaderSessions {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<SessionUser>> {
        Ok(headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|user_id| SessionUser {
                user_id: user_id.to_string(),
            }))
    }
}

/// Bearer credential presented with a request.
#[derive(Debug, Clone)]
pub enum Credential {
    /// No `Authorization` header.
    None,
    ApiKey(api_key::Model),
    Admin,
    /// The shared secret of the scheduled recalculation trigger.
    Cron,
}

fn is_secret(configured: Option<&str>, token: &str) -> bool {
    configured.is_some_and(|secret| !secret.is_empty() && secrets_match(secret, token))
}

/// Authentication middleware.
///
/// Inserts a [`Credential`] and, when present, a [`SessionUser`] into the
/// request extensions. A malformed header or a bearer token that is neither
/// a known API key nor one of the configured secrets ends the request with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let credential = match req.headers().get(header::AUTHORIZATION) {
        None => Credential::None,
        Some(value) => {
            let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) else {
                return AppError::Unauthorized("Invalid authentication".to_string())
                    .into_response();
            };
            let token = token.trim();

            if is_secret(state.admin_token.as_deref(), token) {
                Credential::Admin
            } else if is_secret(state.cron_secret.as_deref(), token) {
                Credential::Cron
            } else if token.starts_with(KEY_PREFIX) {
                match state.api_key_service.authenticate(token).await {
                    Ok(key) => {
                        debug!(key_id = %key.id, "Authenticated API key");
                        Credential::ApiKey(key)
                    }
                    Err(e) => return e.into_response(),
                }
            } else {
                debug!("Rejected unrecognized bearer token");
                return AppError::Unauthorized("Invalid API key".to_string()).into_response();
            }
        }
    };

    match state.sessions.resolve(req.headers()).await {
        Ok(Some(session)) => {
            req.extensions_mut().insert(session);
        }
        Ok(None) => {}
        Err(e) => return e.into_response(),
    }

    req.extensions_mut().insert(credential);
    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_header_sessions() {
        let resolver = HeaderSessions::new("x-osccai-user").unwrap();

        let mut headers = HeaderMap::new();
        assert!(resolver.resolve(&headers).await.unwrap().is_none());

        headers.insert("x-osccai-user", "user-1".parse().unwrap());
        let session = resolver.resolve(&headers).await.unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");

        headers.insert("x-osccai-user", "  ".parse().unwrap());
        assert!(resolver.resolve(&headers).await.unwrap().is_none());
    }

    #[test]
    fn test_configured_secret_matching() {
        assert!(is_secret(Some("admin-token"), "admin-token"));
        assert!(!is_secret(Some("admin-token"), "admin-tokeN"));
        assert!(!is_secret(Some(""), ""));
        assert!(!is_secret(None, "admin-token"));
    }

    #[test]
    fn test_invalid_header_name() {
        assert!(HeaderSessions::new("bad header").is_err());
    }
}
