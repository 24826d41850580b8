//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use osccai_common::AppError;
use osccai_core::{Manager, ParticipantIdentity, authorize_model};
use serde::de::DeserializeOwned;

use crate::middleware::{Credential, SessionUser};

/// Who is calling, as established by the auth middleware.
#[derive(Debug, Clone)]
pub struct Caller {
    pub credential: Credential,
    pub session: Option<SessionUser>,
}

impl Caller {
    /// Whether the caller presented an API key.
    pub const fn has_api_key(&self) -> bool {
        matches!(self.credential, Credential::ApiKey(_))
    }

    /// Require an API key scoped to `community_model_id`, or a session.
    ///
    /// Missing credentials are `Unauthorized`; a key for another model is
    /// `Forbidden`.
    pub fn require_key_or_session(&self, community_model_id: &str) -> Result<(), AppError> {
        match &self.credential {
            Credential::ApiKey(key) => authorize_model(key, community_model_id),
            Credential::Admin => Ok(()),
            Credential::None | Credential::Cron if self.session.is_some() => Ok(()),
            Credential::None | Credential::Cron => Err(AppError::Unauthorized(
                "Invalid authentication".to_string(),
            )),
        }
    }

    /// An API key, if present, must be scoped to `community_model_id`.
    pub fn check_optional_key(&self, community_model_id: &str) -> Result<(), AppError> {
        match &self.credential {
            Credential::ApiKey(key) => authorize_model(key, community_model_id),
            Credential::Admin | Credential::None | Credential::Cron => Ok(()),
        }
    }

    /// Require an API key scoped to the model, the admin token, or the
    /// model owner's session.
    pub fn require_model_access(
        &self,
        community_model_id: &str,
        owner_id: &str,
    ) -> Result<(), AppError> {
        match (&self.credential, &self.session) {
            (Credential::ApiKey(key), _) => authorize_model(key, community_model_id),
            (Credential::Admin, _) => Ok(()),
            (Credential::None | Credential::Cron, Some(session)) if session.user_id == owner_id => {
                Ok(())
            }
            (Credential::None | Credential::Cron, Some(_)) => Err(AppError::Forbidden(
                "You do not own this community model".to_string(),
            )),
            (Credential::None | Credential::Cron, None) => Err(AppError::Unauthorized(
                "Invalid authentication".to_string(),
            )),
        }
    }

    /// Participant identity for this request.
    ///
    /// A session identifies the account; otherwise the client-supplied
    /// anonymous id is used.
    pub fn identity(&self, anonymous_id: Option<&str>) -> Result<ParticipantIdentity, AppError> {
        if let Some(session) = &self.session {
            return Ok(ParticipantIdentity::Account(session.user_id.clone()));
        }
        anonymous_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| ParticipantIdentity::Anonymous(id.trim().to_string()))
            .ok_or_else(|| AppError::Validation("AnonymousId is required".to_string()))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            credential: parts
                .extensions
                .get::<Credential>()
                .cloned()
                .unwrap_or(Credential::None),
            session: parts.extensions.get::<SessionUser>().cloned(),
        })
    }
}

/// Caller allowed to attempt management operations.
#[derive(Debug, Clone)]
pub struct ManagerAuth(pub Manager);

impl<S> FromRequestParts<S> for ManagerAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if matches!(parts.extensions.get::<Credential>(), Some(Credential::Admin)) {
            return Ok(Self(Manager::Admin));
        }
        parts
            .extensions
            .get::<SessionUser>()
            .map(|s| Self(Manager::Owner(s.user_id.clone())))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// JSON body whose rejections use the API error shape.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e.body_text())))
    }
}

/// Optional JSON body; an empty body yields `T::default()`.
#[derive(Debug, Clone)]
pub struct OptionalJsonBody<T>(pub T);

impl<S, T> FromRequest<S> for OptionalJsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid body: {}", e.body_text())))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use osccai_db::entities::api_key;

    fn key(model: &str) -> Credential {
        Credential::ApiKey(api_key::Model {
            id: "k1".to_string(),
            key_hash: String::new(),
            name: "kiosk".to_string(),
            community_model_id: model.to_string(),
            enabled: true,
            last_used_at: None,
            created_at: Utc::now().into(),
        })
    }

    fn caller(credential: Credential, session: Option<&str>) -> Caller {
        Caller {
            credential,
            session: session.map(|id| SessionUser {
                user_id: id.to_string(),
            }),
        }
    }

    #[test]
    fn test_key_scope() {
        assert!(caller(key("m1"), None).require_key_or_session("m1").is_ok());
        assert!(matches!(
            caller(key("m2"), None).require_key_or_session("m1"),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            caller(Credential::None, None).require_key_or_session("m1"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(caller(Credential::None, Some("u1")).require_key_or_session("m1").is_ok());
    }

    #[test]
    fn test_model_access() {
        assert!(caller(Credential::Admin, None).require_model_access("m1", "u1").is_ok());
        assert!(caller(Credential::None, Some("u1")).require_model_access("m1", "u1").is_ok());
        assert!(matches!(
            caller(Credential::None, Some("u2")).require_model_access("m1", "u1"),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            caller(Credential::Cron, None).require_model_access("m1", "u1"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_identity() {
        let anon = caller(Credential::None, None);
        assert_eq!(
            anon.identity(Some("a1")).unwrap(),
            ParticipantIdentity::Anonymous("a1".to_string())
        );
        assert!(matches!(anon.identity(Some("  ")), Err(AppError::Validation(_))));

        let session = caller(Credential::None, Some("u1"));
        assert_eq!(
            session.identity(None).unwrap(),
            ParticipantIdentity::Account("u1".to_string())
        );
    }
}
