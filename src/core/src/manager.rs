//! Manager - orchestration of one submission at a time.
//!
//! Owns the job collection and the shared status board. The collection is
//! only replaced by `submit`, on the caller's task; from then on jobs only
//! see each other through the board.
//!
//! All methods that start jobs must be called from within a Tokio runtime.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::dag::GraphValidator;
use crate::error::Result;
use crate::jobs::{Job, JobContext, JobReportEntry, JobStatus, ManagerReport, PublishedStatus, StatusBoard};
use crate::loader;
use crate::observability::metrics;
use crate::runner::{CommandRunner, ProcessRunner};

/// Drives a validated job graph to completion.
pub struct Manager {
    config: ManagerConfig,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<StatusBoard>,
    jobs: Vec<Arc<Job>>,
    submission_id: Option<Uuid>,
}

impl Manager {
    /// Create a manager that runs commands as child processes.
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    pub fn with_runner(config: ManagerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            registry: Arc::new(StatusBoard::new()),
            jobs: Vec::new(),
            submission_id: None,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Jobs of the current submission, in submission order.
    pub fn jobs(&self) -> &[Arc<Job>] {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&Arc<Job>> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    pub fn submission_id(&self) -> Option<Uuid> {
        self.submission_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the job graph.
    ///
    /// Waits for running jobs of the previous submission, clears the board,
    /// validates and builds the new jobs. On failure the manager is left
    /// empty: no jobs and an empty board.
    ///
    /// An invalid [`ManagerConfig`] fails with `ConfigurationError`. The
    /// config never changes, so no earlier submission can have been accepted.
    pub async fn submit(&mut self, contexts: &[JobContext]) -> Result<()> {
        self.config.validate()?;
        self.block_until_idle(self.config.poll_interval()).await;

        self.registry.clear();
        self.jobs.clear();
        self.submission_id = None;

        GraphValidator::validate(contexts)?;

        let time_unit = self.config.time_unit();
        let mut jobs = Vec::with_capacity(contexts.len());
        for context in contexts {
            let mut context = context.clone();
            if context.log_output_directory.is_none() {
                context.log_output_directory = self.config.log_output_directory.clone();
            }

            match Job::configure(&context, time_unit, Some(Arc::clone(&self.registry))) {
                Ok(job) => jobs.push(Arc::new(job)),
                Err(error) => {
                    self.registry.clear();
                    return Err(error);
                }
            }
        }

        let submission_id = Uuid::new_v4();
        self.jobs = jobs;
        self.submission_id = Some(submission_id);

        metrics::record_submission(self.jobs.len());
        info!(submission_id = %submission_id, jobs = self.jobs.len(), "Submission accepted");
        Ok(())
    }

    /// Load a job file and submit it.
    pub async fn submit_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let contexts = loader::load_contexts(path)?;
        self.submit(&contexts).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driving
    // ─────────────────────────────────────────────────────────────────────────

    /// Start every job that is ready right now. Returns how many started.
    pub fn start_ready_jobs(&self) -> usize {
        let mut started = 0;
        for job in &self.jobs {
            if !job.is_ready() {
                continue;
            }
            match Arc::clone(job).spawn(Arc::clone(&self.runner)) {
                Ok(_) => started += 1,
                Err(error) => error.log(),
            }
        }

        if started > 0 {
            debug!(started, "Ready jobs started");
        }
        started
    }

    /// Poll until no job is `Running`.
    pub async fn block_until_idle(&self, poll_interval: Duration) {
        while self.any_running() {
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Drive the submission until it completes, an error is observed, or
    /// nothing can make progress; then wait for running jobs and report.
    ///
    /// Jobs left `Ready` behind a failed dependency are never started.
    pub async fn run(&self) -> ManagerReport {
        let poll_interval = self.config.poll_interval();

        loop {
            let started = self.start_ready_jobs();

            if self.error_occurred() {
                warn!("Job error observed, no further jobs will be started");
                break;
            }
            if self.all_terminal() {
                break;
            }
            if started == 0 && !self.any_running() && !self.jobs.iter().any(|job| job.is_ready()) {
                warn!(stuck = ?self.stuck_jobs(), "No job can make progress");
                break;
            }

            tokio::time::sleep(poll_interval).await;
        }

        self.block_until_idle(poll_interval).await;
        self.report()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn any_running(&self) -> bool {
        self.registry.any(|entry| entry.status == JobStatus::Running)
    }

    /// True when every job is `Completed` or `RetryOut`; vacuously true for
    /// an empty submission.
    pub fn all_terminal(&self) -> bool {
        self.registry.all(|entry| entry.status.is_terminal())
    }

    pub fn error_occurred(&self) -> bool {
        self.registry.any(PublishedStatus::is_error)
    }

    /// Per-job reports in submission order.
    pub fn report(&self) -> ManagerReport {
        ManagerReport {
            submission_id: self.submission_id,
            completed: self.all_terminal(),
            error_occurred: self.error_occurred(),
            results: self
                .jobs
                .iter()
                .map(|job| JobReportEntry {
                    id: job.id().to_string(),
                    report: job.report(),
                })
                .collect(),
        }
    }

    /// The board's contents in submission order.
    pub fn status_snapshot(&self) -> Vec<(String, PublishedStatus)> {
        let snapshot = self.registry.snapshot();
        self.jobs
            .iter()
            .filter_map(|job| snapshot.get(job.id()).map(|status| (job.id().to_string(), *status)))
            .collect()
    }

    /// `Ready` jobs that can never start: some dependency ended in error or
    /// is itself stuck. Observational only.
    pub fn stuck_jobs(&self) -> Vec<String> {
        let snapshot = self.registry.snapshot();
        let mut stuck: HashSet<&str> = HashSet::new();

        loop {
            let mut changed = false;
            for job in &self.jobs {
                if stuck.contains(job.id()) {
                    continue;
                }
                let waiting = snapshot
                    .get(job.id())
                    .map_or(false, |entry| entry.status == JobStatus::Ready);
                if !waiting {
                    continue;
                }

                let blocked = job.dependencies().iter().any(|dependency| {
                    stuck.contains(dependency.as_str())
                        || snapshot.get(dependency).map_or(false, PublishedStatus::is_error)
                });
                if blocked {
                    stuck.insert(job.id());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        self.jobs
            .iter()
            .filter(|job| stuck.contains(job.id()))
            .map(|job| job.id().to_string())
            .collect()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("jobs", &self.jobs.len())
            .field("submission_id", &self.submission_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunOutcome;
    use crate::jobs::CommandLine;
    use async_trait::async_trait;

    /// Exits with the code given as the command text.
    struct ExitWith;

    #[async_trait]
    impl CommandRunner for ExitWith {
        async fn run(&self, command: &CommandLine, _: Option<Duration>) -> Result<RunOutcome> {
            Ok(RunOutcome::exited(command.to_string().parse().unwrap_or(0)))
        }
    }

    fn manager() -> Manager {
        Manager::with_runner(
            ManagerConfig::default().with_poll_interval_ms(1).with_time_unit_ms(1),
            Arc::new(ExitWith),
        )
    }

    #[tokio::test]
    async fn test_empty_submission_is_complete() {
        let mut manager = manager();
        manager.submit(&[]).await.unwrap();

        assert!(manager.all_terminal());
        assert!(!manager.any_running());
        assert!(manager.run().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_log_directory_is_inherited() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::with_runner(
            ManagerConfig::default().with_log_output_directory(dir.path()),
            Arc::new(ExitWith),
        );
        let contexts = vec![
            JobContext::new("a", "0"),
            JobContext::new("b", "0").with_log_output_directory(dir.path().join("own")),
        ];
        manager.submit(&contexts).await.unwrap();

        let a = manager.job("a").unwrap().log_sink().unwrap().path().to_path_buf();
        let b = manager.job("b").unwrap().log_sink().unwrap().path().to_path_buf();
        assert_eq!(a, dir.path().join("a.log"));
        assert_eq!(b, dir.path().join("own").join("b.log"));
    }

    #[tokio::test]
    async fn test_stuck_jobs_follow_failed_chain() {
        let mut manager = manager();
        let contexts = vec![
            JobContext::new("a", "1"),
            JobContext::new("b", "0").waits(["a"]),
            JobContext::new("c", "0").waits(["b"]),
            JobContext::new("free", "0"),
        ];
        manager.submit(&contexts).await.unwrap();

        let report = manager.run().await;
        manager.block_until_idle(Duration::from_millis(1)).await;

        assert!(report.error_occurred);
        assert!(!report.completed);
        assert_eq!(manager.stuck_jobs(), vec!["b", "c"]);
        assert_eq!(manager.job("b").unwrap().status(), JobStatus::Ready);
    }

    #[tokio::test]
    async fn test_zero_time_unit_is_rejected_on_submit() {
        let mut manager = Manager::with_runner(
            ManagerConfig::default().with_time_unit_ms(0),
            Arc::new(ExitWith),
        );
        let contexts = vec![JobContext::new("a", "0").with_timeout(30.0).with_retry(2)];

        let error = manager.submit(&contexts).await.unwrap_err();
        assert_eq!(error.code(), crate::error::ErrorCode::ConfigurationError);
        assert!(manager.jobs().is_empty());
        assert!(manager.submission_id().is_none());
        assert!(manager.run().await.is_empty());
    }
}
