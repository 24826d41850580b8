//! Participant resolution.

use chrono::Utc;
use osccai_common::{AppError, AppResult, IdGenerator};
use osccai_db::{entities::participant, repositories::ParticipantRepository};
use sea_orm::Set;
use tracing::debug;

/// How a caller is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantIdentity {
    /// Account resolved from a first-party session.
    Account(String),
    /// Client-generated anonymous handle.
    Anonymous(String),
}

/// Resolves callers to participant rows, creating them on first contact.
#[derive(Clone)]
pub struct ParticipantService {
    participant_repo: ParticipantRepository,
    id_gen: IdGenerator,
}

impl ParticipantService {
    /// Create a new participant service.
    #[must_use]
    pub const fn new(participant_repo: ParticipantRepository) -> Self {
        Self {
            participant_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Look up a participant without creating one.
    pub async fn find(
        &self,
        identity: &ParticipantIdentity,
    ) -> AppResult<Option<participant::Model>> {
        match identity {
            ParticipantIdentity::Account(user_id) => {
                self.participant_repo.find_by_user_id(user_id).await
            }
            ParticipantIdentity::Anonymous(anonymous_id) => {
                self.participant_repo.find_by_anonymous_id(anonymous_id).await
            }
        }
    }

    /// Find the participant for an identity, creating it if needed.
    ///
    /// Two first contacts racing on the same identity both end up with the
    /// row that won the unique index.
    pub async fn get_or_create(
        &self,
        identity: &ParticipantIdentity,
    ) -> AppResult<participant::Model> {
        if let Some(existing) = self.find(identity).await? {
            return Ok(existing);
        }

        let (user_id, anonymous_id) = match identity {
            ParticipantIdentity::Account(id) => (Some(id.clone()), None),
            ParticipantIdentity::Anonymous(id) => (None, Some(id.clone())),
        };

        let model = participant::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id),
            anonymous_id: Set(anonymous_id),
            created_at: Set(Utc::now().into()),
        };

        match self.participant_repo.create(model).await {
            Ok(created) => {
                debug!(participant_id = %created.id, "Created participant");
                Ok(created)
            }
            Err(AppError::Conflict(_)) => self.find(identity).await?.ok_or_else(|| {
                AppError::Internal("Participant missing after unique conflict".to_string())
            }),
            Err(e) => Err(e),
        }
    }
}
