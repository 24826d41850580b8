//! Scheduled jobs for periodic score recalculation.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use osccai_common::{AppResult, ConsensusConfig};
use osccai_core::{BatchReport, ScoringService};
use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

/// Scheduled job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    /// Ask the scoring service to recalculate every published poll.
    RecalculateScores { force: bool },
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Interval between batch recalculations (default: 1 hour).
    pub recalculation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recalculation_interval: Duration::from_secs(3600),
        }
    }
}

impl From<&ConsensusConfig> for SchedulerConfig {
    fn from(config: &ConsensusConfig) -> Self {
        Self {
            enabled: config.scheduler_enabled,
            recalculation_interval: Duration::from_secs(config.recalculation_interval_secs.max(1)),
        }
    }
}

/// Scheduler state for tracking job runs.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub last_recalculation: Option<DateTime<Utc>>,
    pub last_report: Option<BatchReport>,
    pub failed_runs: u64,
}

/// Job executor trait for scheduled jobs.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one batch recalculation.
    async fn recalculate_scores(&self, force: bool) -> AppResult<BatchReport>;
}

#[async_trait]
impl JobExecutor for ScoringService {
    async fn recalculate_scores(&self, force: bool) -> AppResult<BatchReport> {
        self.recalculate_all(force).await
    }
}

async fn execute<E: JobExecutor + ?Sized>(
    job: ScheduledJob,
    executor: &E,
    state: &RwLock<SchedulerState>,
) {
    match job {
        ScheduledJob::RecalculateScores { force } => {
            let result = executor.recalculate_scores(force).await;
            let mut state = state.write().await;
            state.last_recalculation = Some(Utc::now());
            match result {
                Ok(report) => {
                    if report.failures.is_empty() {
                        tracing::info!(
                            attempted = report.attempted,
                            succeeded = report.succeeded,
                            "Scheduled score recalculation finished"
                        );
                    } else {
                        tracing::warn!(
                            attempted = report.attempted,
                            succeeded = report.succeeded,
                            failed = report.failures.len(),
                            "Scheduled score recalculation finished with failures"
                        );
                    }
                    state.last_report = Some(report);
                }
                Err(e) => {
                    state.failed_runs += 1;
                    tracing::error!(error = %e, "Scheduled score recalculation failed");
                }
            }
        }
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// The first run happens one interval after start. The task exits once
/// `shutdown` flips to `true` or its sender is dropped; a run in progress
/// is allowed to finish.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
    state: Arc<RwLock<SchedulerState>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = config.recalculation_interval;

    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Score recalculation scheduler disabled");
            return;
        }
        tracing::info!(interval_secs = period.as_secs(), "Score recalculation scheduler started");

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    execute(
                        ScheduledJob::RecalculateScores { force: false },
                        executor.as_ref(),
                        &state,
                    )
                    .await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Score recalculation scheduler stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use osccai_common::AppError;

    use super::*;

    struct CountingExecutor {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobExecutor for CountingExecutor {
        async fn recalculate_scores(&self, force: bool) -> AppResult<BatchReport> {
            assert!(!force);
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Database("connection refused".to_string()));
            }
            Ok(BatchReport {
                attempted: 2,
                succeeded: 1,
                failures: vec![("poll-2".to_string(), "Upstream returned 503".to_string())],
            })
        }
    }

    fn executor(fail: bool) -> Arc<CountingExecutor> {
        Arc::new(CountingExecutor {
            runs: AtomicUsize::new(0),
            fail,
        })
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            enabled: true,
            recalculation_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.recalculation_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_scheduler_config_from_consensus() {
        let consensus = ConsensusConfig {
            recalculation_interval_secs: 0,
            scheduler_enabled: false,
            ..ConsensusConfig::default()
        };
        let config = SchedulerConfig::from(&consensus);
        assert!(!config.enabled);
        assert_eq!(config.recalculation_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_scheduler_state_default() {
        let state = SchedulerState::default();
        assert!(state.last_recalculation.is_none());
        assert!(state.last_report.is_none());
        assert_eq!(state.failed_runs, 0);
    }

    #[tokio::test]
    async fn test_scheduler_runs_and_stops() {
        let executor = executor(false);
        let state = Arc::new(RwLock::new(SchedulerState::default()));
        let (tx, rx) = watch::channel(false);

        let handle = run_scheduler(fast_config(), executor.clone(), state.clone(), rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(executor.runs.load(Ordering::SeqCst) >= 1);
        let state = state.read().await;
        assert!(state.last_recalculation.is_some());
        assert_eq!(state.last_report.as_ref().unwrap().failures.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_records_failed_runs() {
        let executor = executor(true);
        let state = Arc::new(RwLock::new(SchedulerState::default()));
        let (tx, rx) = watch::channel(false);

        let handle = run_scheduler(fast_config(), executor.clone(), state.clone(), rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);
        handle.await.unwrap();

        let state = state.read().await;
        assert!(state.failed_runs >= 1);
        assert!(state.last_report.is_none());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_exits() {
        let executor = executor(false);
        let (_tx, rx) = watch::channel(false);
        let config = SchedulerConfig {
            enabled: false,
            ..fast_config()
        };

        run_scheduler(config, executor.clone(), Arc::default(), rx)
            .await
            .unwrap();
        assert_eq!(executor.runs.load(Ordering::SeqCst), 0);
    }
}
