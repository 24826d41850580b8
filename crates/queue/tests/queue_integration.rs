//! Queue integration tests.
//!
//! These tests run the scheduler against the real scoring service with a
//! mock database and a stub scoring trigger.

#![allow(clippy::unwrap_used)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use osccai_common::{AppError, AppResult};
use osccai_core::{RecalculationResponse, ScoreTrigger, ScoringService};
use osccai_db::{entities::poll, repositories::PollRepository};
use osccai_queue::{SchedulerConfig, SchedulerState, run_scheduler};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::json;
use tokio::sync::{RwLock, watch};

struct RecordingTrigger {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl ScoreTrigger for RecordingTrigger {
    async fn trigger(&self, poll_id: &str, force: bool) -> AppResult<RecalculationResponse> {
        assert!(!force);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(poll_id.to_string());
        if poll_id == "poll-broken" {
            return Err(AppError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(RecalculationResponse {
            poll_id: poll_id.to_string(),
            upstream: json!({ "ok": true }),
        })
    }
}

fn published_poll(id: &str) -> poll::Model {
    poll::Model {
        id: id.to_string(),
        community_model_id: "model-1".to_string(),
        title: "Values".to_string(),
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

#[tokio::test]
async fn test_scheduled_batch_continues_past_failures() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![published_poll("poll-ok"), published_poll("poll-broken")]])
        .into_connection();
    let trigger = Arc::new(RecordingTrigger {
        calls: AtomicUsize::new(0),
        seen: Mutex::new(Vec::new()),
    });
    let scoring = ScoringService::new(trigger.clone(), PollRepository::new(Arc::new(db)));

    let state = Arc::new(RwLock::new(SchedulerState::default()));
    let (tx, rx) = watch::channel(false);
    let config = SchedulerConfig {
        enabled: true,
        recalculation_interval: Duration::from_millis(30),
    };

    let handle = run_scheduler(config, Arc::new(scoring), state.clone(), rx);

    // Only one batch has mock rows; wait for it, then stop.
    for _ in 0..50 {
        if trigger.calls.load(Ordering::SeqCst) >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tx.send(true).unwrap();
    handle.await.unwrap();

    let mut seen = trigger.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["poll-broken".to_string(), "poll-ok".to_string()]);

    let state = state.read().await;
    let report = state.last_report.as_ref().unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures[0].0, "poll-broken");
}
