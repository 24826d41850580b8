//! Score recalculation trigger.
//!
//! Consensus scores are computed by a separate scoring service reached over
//! HTTP. This module only asks for a recomputation; the scores themselves
//! arrive later through the score writeback webhook.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use osccai_common::{AppError, AppResult, ConsensusConfig};
use osccai_db::repositories::PollRepository;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use url::Url;

/// Path of the recalculation endpoint on the scoring service.
pub const RECALCULATION_PATH: &str = "/api/update-gac-scores";

/// Polls recalculated concurrently by a batch run.
const BATCH_CONCURRENCY: usize = 4;

/// Upstream acknowledgement of a recalculation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationResponse {
    pub poll_id: String,
    /// Response body as returned by the scoring service.
    pub upstream: Value,
}

/// Something that can ask for a poll's scores to be recomputed.
#[async_trait]
pub trait ScoreTrigger: Send + Sync {
    /// Request recalculation of one poll.
    ///
    /// `force` asks the scoring service to recompute even if nothing changed
    /// since the last run.
    async fn trigger(&self, poll_id: &str, force: bool) -> AppResult<RecalculationResponse>;
}

/// HTTP client for the external scoring service.
#[derive(Clone)]
pub struct ScoringClient {
    http: reqwest::Client,
    endpoint: Option<Url>,
    api_key: Option<String>,
    timeout: Duration,
}

impl ScoringClient {
    /// Build a client from configuration.
    pub fn from_config(config: &ConsensusConfig) -> AppResult<Self> {
        let endpoint = config
            .service_url
            .as_ref()
            .map(|base| base.join(RECALCULATION_PATH))
            .transpose()
            .map_err(|e| AppError::Config(format!("Invalid scoring service URL: {e}")))?;

        Self::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Build a client for an explicit endpoint.
    pub fn new(endpoint: Option<Url>, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("osccai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            timeout,
        })
    }

    async fn send(&self, endpoint: &Url, poll_id: &str, force: bool) -> AppResult<Value> {
        let mut request = self
            .http
            .post(endpoint.clone())
            .json(&json!({ "pollId": poll_id, "force": force }));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Scoring request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to read scoring response: {e}")))?;

        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl ScoreTrigger for ScoringClient {
    async fn trigger(&self, poll_id: &str, force: bool) -> AppResult<RecalculationResponse> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| AppError::Config("Scoring service URL is not configured".to_string()))?;

        // Dropping the request future on timeout cancels the in-flight call.
        let upstream = tokio::time::timeout(self.timeout, self.send(endpoint, poll_id, force))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "Scoring service did not answer within {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;

        Ok(RecalculationResponse {
            poll_id: poll_id.to_string(),
            upstream,
        })
    }
}

/// Outcome of a batch recalculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Poll id and error message for each failed poll.
    pub failures: Vec<(String, String)>,
}

/// Recalculation entry points used by the API and the scheduler.
#[derive(Clone)]
pub struct ScoringService {
    trigger: Arc<dyn ScoreTrigger>,
    poll_repo: PollRepository,
}

impl ScoringService {
    #[must_use]
    pub fn new(trigger: Arc<dyn ScoreTrigger>, poll_repo: PollRepository) -> Self {
        Self { trigger, poll_repo }
    }

    /// Recalculate one live poll.
    ///
    /// Only the poll's identity is read before calling out; no statement row
    /// is locked while waiting on the scoring service.
    pub async fn recalculate_poll(
        &self,
        poll_id: &str,
        force: bool,
    ) -> AppResult<RecalculationResponse> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let response = self.trigger.trigger(&poll.id, force).await?;
        info!(poll_id, force, "Score recalculation requested");
        Ok(response)
    }

    /// Recalculate every published, live poll.
    ///
    /// A failing poll is logged and recorded; it never aborts the batch.
    pub async fn recalculate_all(&self, force: bool) -> AppResult<BatchReport> {
        let polls = self.poll_repo.find_recalculable().await?;
        let attempted = polls.len();

        let results: Vec<(String, AppResult<RecalculationResponse>)> = stream::iter(polls)
            .map(|poll| {
                let trigger = self.trigger.clone();
                async move {
                    let result = trigger.trigger(&poll.id, force).await;
                    (poll.id, result)
                }
            })
            .buffer_unordered(BATCH_CONCURRENCY)
            .collect()
            .await;

        let mut report = BatchReport {
            attempted,
            ..BatchReport::default()
        };
        for (poll_id, result) in results {
            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    if e.is_retryable() {
                        warn!(poll_id = %poll_id, error = %e, "Score recalculation timed out");
                    } else {
                        error!(poll_id = %poll_id, error = %e, "Score recalculation failed");
                    }
                    report.failures.push((poll_id, e.to_string()));
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "Score recalculation batch finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use chrono::Utc;
    use osccai_db::entities::poll;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Mutex;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    fn client(base: &Url, timeout: Duration) -> ScoringClient {
        ScoringClient::new(
            Some(base.join(RECALCULATION_PATH).unwrap()),
            Some("svc-key".to_string()),
            timeout,
        )
        .unwrap()
    }

    fn test_poll(id: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
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
        }
    }

    /// Fails for the polls it is told to fail.
    struct StubTrigger {
        failing: Vec<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScoreTrigger for StubTrigger {
        async fn trigger(&self, poll_id: &str, _force: bool) -> AppResult<RecalculationResponse> {
            self.seen.lock().unwrap().push(poll_id.to_string());
            if self.failing.contains(&poll_id) {
                return Err(AppError::Timeout("stub".to_string()));
            }
            Ok(RecalculationResponse {
                poll_id: poll_id.to_string(),
                upstream: Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn test_trigger_success_sends_poll_and_force() {
        let router = Router::new().route(
            RECALCULATION_PATH,
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("X-API-Key").unwrap(), "svc-key");
                Json(json!({ "received": body }))
            }),
        );
        let base = serve(router).await;

        let response = client(&base, Duration::from_secs(5))
            .trigger("p1", true)
            .await
            .unwrap();

        assert_eq!(response.poll_id, "p1");
        assert_eq!(
            response.upstream,
            json!({ "received": { "pollId": "p1", "force": true } })
        );
    }

    #[tokio::test]
    async fn test_trigger_non_success_is_upstream_error() {
        let router = Router::new().route(
            RECALCULATION_PATH,
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "scoring offline") }),
        );
        let base = serve(router).await;

        let err = client(&base, Duration::from_secs(5))
            .trigger("p1", false)
            .await
            .unwrap_err();

        match err {
            AppError::Upstream { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "scoring offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trigger_times_out() {
        let router = Router::new().route(
            RECALCULATION_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let base = serve(router).await;

        let started = std::time::Instant::now();
        let err = client(&base, Duration::from_millis(100))
            .trigger("p1", true)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)));
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_trigger_without_endpoint_is_config_error() {
        let client = ScoringClient::new(None, None, Duration::from_secs(1)).unwrap();
        let err = client.trigger("p1", true).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_from_config_joins_path() {
        let config = ConsensusConfig {
            service_url: Some(Url::parse("https://scoring.example.com/ignored").unwrap()),
            ..ConsensusConfig::default()
        };
        let client = ScoringClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint.unwrap().as_str(),
            "https://scoring.example.com/api/update-gac-scores"
        );
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll("p1"), test_poll("p2"), test_poll("p3")]])
                .into_connection(),
        );
        let trigger = Arc::new(StubTrigger {
            failing: vec!["p2"],
            seen: Mutex::new(Vec::new()),
        });

        let service = ScoringService::new(trigger.clone(), PollRepository::new(db));
        let report = service.recalculate_all(false).await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "p2");
        assert_eq!(trigger.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_recalculate_missing_poll() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );
        let trigger = Arc::new(StubTrigger {
            failing: vec![],
            seen: Mutex::new(Vec::new()),
        });

        let service = ScoringService::new(trigger.clone(), PollRepository::new(db));
        let err = service.recalculate_poll("nope", true).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(trigger.seen.lock().unwrap().is_empty());
    }
}
