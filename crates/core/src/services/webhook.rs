//! Inbound webhooks.
//!
//! Every webhook carries an HMAC-SHA256 signature over `"{timestamp}.{body}"`
//! in `X-Webhook-Signature` (hex, optionally prefixed with `sha256=`) and the
//! unix timestamp it was signed at in `X-Webhook-Timestamp`. Requests are
//! authenticated before the body is parsed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use osccai_common::{AppError, AppResult, WebhookConfig};
use osccai_db::repositories::{PollRepository, ScoreUpdate, StatementRepository};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use super::{constitution::ConstitutionService, event::EventService};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Event asking for a fresh constitution.
pub const STATEMENTS_CHANGED: &str = "statements_changed";

/// Checks signatures and freshness of inbound webhooks.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    max_age_secs: i64,
}

impl WebhookVerifier {
    #[must_use]
    pub fn new(secret: Option<String>, max_age_secs: u64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            max_age_secs: i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.secret.clone(), config.max_age_secs)
    }

    /// Authenticate a raw webhook request.
    ///
    /// Rejects timestamps further than the allowed age from `now` in either
    /// direction. The signature is compared in constant time.
    pub fn verify(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("Webhook secret not configured".to_string()))?;

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing signature".to_string()))?;

        let timestamp = timestamp
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing timestamp".to_string()))?;
        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid timestamp".to_string()))?;

        if (now.timestamp() - signed_at).abs() > self.max_age_secs {
            return Err(AppError::Unauthorized(
                "Webhook timestamp too old".to_string(),
            ));
        }

        let provided = hex::decode(signature.strip_prefix("sha256=").unwrap_or(signature))
            .map_err(|_| AppError::Unauthorized("invalid signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid webhook secret: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| AppError::Unauthorized("invalid signature".to_string()))
    }

    /// Signature for a body, in the format `verify` accepts.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> AppResult<String> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| AppError::Config("Webhook secret not configured".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }
}

/// Consensus service notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub poll_id: String,
    #[serde(default)]
    pub timestamp: String,
}

/// One statement's scores in a writeback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementScore {
    pub statement_id: String,
    pub gac_score: Option<f64>,
    pub priority_score: Option<f64>,
}

/// Score writeback from the scoring service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresPayload {
    #[serde(default)]
    pub poll_id: String,
    #[serde(default)]
    pub scores: Vec<StatementScore>,
}

/// What a consensus webhook did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusOutcome {
    pub event: String,
    pub constitution_id: Option<String>,
}

fn parse<T: for<'de> Deserialize<'de>>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("Invalid JSON payload".to_string()))
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".to_string())
}

/// Authenticates and dispatches inbound webhooks.
#[derive(Clone)]
pub struct WebhookService {
    verifier: WebhookVerifier,
    constitutions: ConstitutionService,
    poll_repo: PollRepository,
    statement_repo: StatementRepository,
    events: EventService,
}

impl WebhookService {
    #[must_use]
    pub const fn new(
        verifier: WebhookVerifier,
        constitutions: ConstitutionService,
        poll_repo: PollRepository,
        statement_repo: StatementRepository,
        events: EventService,
    ) -> Self {
        Self {
            verifier,
            constitutions,
            poll_repo,
            statement_repo,
            events,
        }
    }

    fn authenticate(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> AppResult<()> {
        self.verifier
            .verify(signature, timestamp, body, Utc::now())
            .inspect_err(|e| warn!(error = %e, "Rejected webhook"))
    }

    /// Handle a consensus service notification.
    pub async fn handle_consensus(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> AppResult<ConsensusOutcome> {
        self.authenticate(signature, timestamp, body)?;

        let payload: ConsensusEvent = parse(body)?;
        if payload.event.is_empty()
            || payload.model_id.is_empty()
            || payload.poll_id.is_empty()
            || payload.timestamp.is_empty()
        {
            return Err(missing_fields());
        }

        match payload.event.as_str() {
            STATEMENTS_CHANGED => {
                let constitution = self
                    .constitutions
                    .create_and_activate(&payload.model_id)
                    .await?;
                info!(
                    model_id = %payload.model_id,
                    poll_id = %payload.poll_id,
                    constitution_id = %constitution.id,
                    "Constitution regenerated from webhook"
                );
                Ok(ConsensusOutcome {
                    event: payload.event,
                    constitution_id: Some(constitution.id),
                })
            }
            other => {
                warn!(event = other, "Unknown webhook event type");
                Err(AppError::BadRequest("Unknown event type".to_string()))
            }
        }
    }

    /// Store scores pushed by the scoring service.
    ///
    /// Every consensus score that changed is recorded as a system event.
    pub async fn handle_scores(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> AppResult<u64> {
        self.authenticate(signature, timestamp, body)?;

        let payload: ScoresPayload = parse(body)?;
        if payload.poll_id.is_empty() || payload.scores.iter().any(|s| s.statement_id.is_empty()) {
            return Err(missing_fields());
        }

        let poll = self.poll_repo.get_by_id(&payload.poll_id).await?;
        let previous: HashMap<String, Option<f64>> = self
            .statement_repo
            .find_by_poll(&payload.poll_id)
            .await?
            .into_iter()
            .map(|s| (s.id, s.gac_score))
            .collect();

        let updates: Vec<ScoreUpdate> = payload
            .scores
            .into_iter()
            .map(|s| ScoreUpdate {
                statement_id: s.statement_id,
                gac_score: s.gac_score,
                priority_score: s.priority_score,
            })
            .collect();

        let updated = self
            .statement_repo
            .record_scores(&payload.poll_id, &updates)
            .await?;
        info!(poll_id = %payload.poll_id, received = updates.len(), updated, "Scores recorded");

        for update in &updates {
            let (Some(old_score), Some(new_score)) =
                (previous.get(&update.statement_id), update.gac_score)
            else {
                continue;
            };
            if *old_score != Some(new_score) {
                self.events
                    .gac_score_updated(&update.statement_id, &poll, *old_score, new_score)
                    .await;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use osccai_db::{
        entities::{poll, statement, system_event},
        repositories::{CommunityModelRepository, ConstitutionRepository, SystemEventRepository},
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(Some("whsec".to_string()), 300)
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn service(db: DatabaseConnection) -> WebhookService {
        let db = Arc::new(db);
        WebhookService::new(
            verifier(),
            ConstitutionService::new(
                db.clone(),
                ConstitutionRepository::new(db.clone()),
                PollRepository::new(db.clone()),
                StatementRepository::new(db.clone()),
                events(&db),
            ),
            PollRepository::new(db.clone()),
            StatementRepository::new(db.clone()),
            events(&db),
        )
    }

    fn events(db: &Arc<DatabaseConnection>) -> EventService {
        EventService::new(
            SystemEventRepository::new(db.clone()),
            CommunityModelRepository::new(db.clone()),
        )
    }

    fn signed(body: &[u8]) -> (String, String) {
        let ts = Utc::now().timestamp();
        (verifier().sign(ts, body).unwrap(), ts.to_string())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"event":"statements_changed"}"#;
        let signature = verifier().sign(1_700_000_000, body).unwrap();
        assert!(
            verifier()
                .verify(Some(&signature), Some("1700000000"), body, now())
                .is_ok()
        );

        let bare = signature.trim_start_matches("sha256=");
        assert!(verifier().verify(Some(bare), Some("1700000000"), body, now()).is_ok());
    }

    #[test]
    fn test_signature_over_other_body_is_rejected() {
        let signature = verifier().sign(1_700_000_000, b"{\"a\":1}").unwrap();
        let err = verifier()
            .verify(Some(&signature), Some("1700000000"), b"{\"a\":2}", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "invalid signature"));
    }

    #[test]
    fn test_timestamp_is_signed() {
        let body = b"{}";
        let signature = verifier().sign(1_700_000_000, body).unwrap();
        let err = verifier()
            .verify(Some(&signature), Some("1700000010"), body, now())
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "invalid signature"));
    }

    #[test]
    fn test_stale_and_future_timestamps() {
        let body = b"{}";
        for ts in [1_700_000_000 - 301, 1_700_000_000 + 301] {
            let signature = verifier().sign(ts, body).unwrap();
            let err = verifier()
                .verify(Some(&signature), Some(&ts.to_string()), body, now())
                .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Webhook timestamp too old"));
        }

        let ts = 1_700_000_000 - 300;
        let signature = verifier().sign(ts, body).unwrap();
        assert!(
            verifier()
                .verify(Some(&signature), Some(&ts.to_string()), body, now())
                .is_ok()
        );
    }

    #[test]
    fn test_missing_parts() {
        let err = verifier().verify(None, Some("1700000000"), b"{}", now()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Missing signature"));

        let err = verifier().verify(Some("abc"), None, b"{}", now()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Missing timestamp"));

        let err = verifier()
            .verify(Some("zz-not-hex"), Some("1700000000"), b"{}", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "invalid signature"));

        let unconfigured = WebhookVerifier::new(None, 300);
        assert!(unconfigured.verify(Some("ab"), Some("1"), b"{}", now()).is_err());
    }

    #[tokio::test]
    async fn test_bad_signature_never_touches_store() {
        // An empty mock fails any query, so reaching the store would error differently.
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let err = svc
            .handle_consensus(Some("sha256=00"), Some(&Utc::now().timestamp().to_string()), b"not json")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_after_valid_signature() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let body = b"not json";
        let (signature, ts) = signed(body);

        let err = svc
            .handle_consensus(Some(&signature), Some(&ts), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Invalid JSON payload"));
    }

    #[tokio::test]
    async fn test_missing_fields_and_unknown_event() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let body = br#"{"event":"statements_changed","modelId":"m1"}"#;
        let (signature, ts) = signed(body);
        let err = svc
            .handle_consensus(Some(&signature), Some(&ts), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Missing required fields"));

        let body = br#"{"event":"poll_closed","modelId":"m1","pollId":"p1","timestamp":"2025-01-01T00:00:00Z"}"#;
        let (signature, ts) = signed(body);
        let err = svc
            .handle_consensus(Some(&signature), Some(&ts), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Unknown event type"));
    }

    fn scored_statement(id: &str, gac_score: Option<f64>) -> statement::Model {
        statement::Model {
            id: id.to_string(),
            poll_id: "p1".to_string(),
            text: "More benches".to_string(),
            participant_id: None,
            status: statement::StatementStatus::Approved,
            agree_count: 3,
            disagree_count: 1,
            pass_count: 0,
            is_constitutionable: None,
            gac_score,
            priority_score: None,
            last_calculated_at: None,
            deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_scores_recorded_with_change_events() {
        let poll = poll::Model {
            id: "p1".to_string(),
            community_model_id: "m1".to_string(),
            title: "Parks".to_string(),
            description: None,
            published: true,
            require_auth: false,
            allow_participant_statements: true,
            max_votes_per_participant: None,
            min_votes_before_submission: None,
            max_submissions_per_participant: None,
            min_required_submissions: None,
            completion_message: None,
            deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let event = system_event::Model {
            id: "e1".to_string(),
            event_type: system_event::EventType::GacScoreUpdated,
            resource_type: system_event::ResourceType::Statement,
            resource_id: "s1".to_string(),
            community_model_id: Some("m1".to_string()),
            actor_id: "system".to_string(),
            actor_name: Some("System".to_string()),
            is_admin_action: true,
            metadata: serde_json::json!({ "pollId": "p1", "oldScore": 0.5, "newScore": 0.8 }),
            created_at: Utc::now().into(),
        };
        let ok = || sea_orm::MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        };

        // s1 moves from 0.5 to 0.8; s2 keeps 0.3 and records no event
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .append_query_results([vec![
                    scored_statement("s1", Some(0.5)),
                    scored_statement("s2", Some(0.3)),
                ]])
                .append_exec_results([ok(), ok()])
                .append_query_results([[event]])
                .into_connection(),
        );

        let body = br#"{"pollId":"p1","scores":[{"statementId":"s1","gacScore":0.8},{"statementId":"s2","gacScore":0.3}]}"#;
        let (signature, ts) = signed(body);
        let updated = svc
            .handle_scores(Some(&signature), Some(&ts), body)
            .await
            .unwrap();
        assert_eq!(updated, 2);
    }

    #[tokio::test]
    async fn test_scores_require_poll_id() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let body = br#"{"scores":[{"statementId":"s1","gacScore":0.8,"priorityScore":0.1}]}"#;
        let (signature, ts) = signed(body);

        let err = svc
            .handle_scores(Some(&signature), Some(&ts), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Missing required fields"));
    }
}
