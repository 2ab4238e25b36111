//! The job state machine.
//!
//! A [`Job`] is plain data plus methods. The only state it mutates is its own
//! cell and its single entry in the shared [`StatusBoard`]; readiness is judged
//! purely from that board, never by looking at sibling jobs directly.
//!
//! Lock order is always job cell first, then board.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::registry::{PublishedStatus, StatusBoard};
use super::report::{format_elapsed, format_timestamp, JobReport};
use super::{CommandLine, JobContext, JobStatus, RetryPolicy};
use crate::error::{ChainrunError, Result};
use crate::observability::metrics;
use crate::runner::{CommandRunner, RunOutcome};
use crate::sink::LogSink;

/// Exit code recorded when the command could not be launched at all. The
/// report's `error` carries the reason. Signal deaths report `128 + signal`.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

#[derive(Debug, Default)]
struct JobState {
    status: JobStatus,
    exit_code: Option<i32>,
    /// Index of the most recent attempt
    retried: u32,
    attempts: u32,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    error: Option<String>,
    /// Set while an `execute` call owns the attempt loop
    executing: bool,
}

/// One schedulable unit: a command, its dependencies and its retry policy.
#[derive(Debug)]
pub struct Job {
    id: String,
    command: CommandLine,
    policy: RetryPolicy,
    dependencies: Vec<String>,
    log_sink: Option<LogSink>,
    registry: Option<Arc<StatusBoard>>,
    state: Mutex<JobState>,
}

impl Job {
    /// Build a job in state `Ready`.
    ///
    /// `time_unit` is the length of one unit of the context's `timeout`,
    /// `delay` and backoff. A job with dependencies needs a registry to judge
    /// readiness; without one this fails with `MissingRegistry`.
    pub fn configure(
        context: &JobContext,
        time_unit: Duration,
        registry: Option<Arc<StatusBoard>>,
    ) -> Result<Self> {
        if context.id.trim().is_empty() {
            return Err(ChainrunError::invalid_job_context(&context.id, "id must not be empty"));
        }

        let policy = RetryPolicy::from_context(context, time_unit)?;

        if !context.waits.is_empty() && registry.is_none() {
            return Err(ChainrunError::missing_registry(&context.id));
        }

        let mut dependencies: Vec<String> = Vec::with_capacity(context.waits.len());
        for dependency in &context.waits {
            if !dependencies.contains(dependency) {
                dependencies.push(dependency.clone());
            }
        }

        let job = Self {
            id: context.id.clone(),
            command: context.command.clone(),
            policy,
            dependencies,
            log_sink: context
                .log_output_directory
                .as_ref()
                .map(|dir| LogSink::for_job(dir, &context.id)),
            registry,
            state: Mutex::new(JobState::default()),
        };

        job.publish(&job.state.lock());
        debug!(job_id = %job.id, dependencies = ?job.dependencies, "Job configured");
        Ok(job)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn log_sink(&self) -> Option<&LogSink> {
        self.log_sink.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Exit code of the completing attempt; `None` unless `Completed`.
    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().exit_code
    }

    pub fn retried(&self) -> u32 {
        self.state.lock().retried
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Predicates
    // ─────────────────────────────────────────────────────────────────────────

    /// `Ready`, and every dependency published `Completed` with exit code 0.
    pub fn is_ready(&self) -> bool {
        if self.status() != JobStatus::Ready {
            return false;
        }
        if self.dependencies.is_empty() {
            return true;
        }
        self.registry
            .as_ref()
            .map_or(false, |registry| registry.all_satisfied(&self.dependencies))
    }

    pub fn is_running(&self) -> bool {
        self.status() == JobStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Terminal with a non-zero exit code, or terminal through `RetryOut`.
    pub fn has_error(&self) -> bool {
        let state = self.state.lock();
        PublishedStatus::new(state.status, state.exit_code).is_error()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Move `Ready → Running`, stamp the start time and publish.
    pub fn begin(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.transition(&mut state, JobStatus::Running)?;
        state.started_at = Some(Local::now());
        self.publish(&state);
        drop(state);

        info!(job_id = %self.id, command = %self.command, "Job started");
        Ok(())
    }

    /// Begin the job, then run its attempt loop on a new task.
    ///
    /// The transition to `Running` happens before this returns, so a caller
    /// polling the board never observes a started job as still `Ready`.
    pub fn spawn(self: Arc<Self>, runner: Arc<dyn CommandRunner>) -> Result<JoinHandle<()>> {
        self.begin()?;
        Ok(tokio::spawn(async move {
            if let Err(error) = self.execute(runner.as_ref()).await {
                error.log();
            }
        }))
    }

    /// Run the attempt loop to a terminal state.
    ///
    /// Accepts a `Ready` job (begins it) or a `Running` job that was begun
    /// but whose loop has not started yet.
    pub async fn execute(&self, runner: &dyn CommandRunner) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.executing {
                return Err(ChainrunError::invalid_state_transition(
                    &self.id,
                    &state.status,
                    &JobStatus::Running,
                ));
            }
            if state.status == JobStatus::Ready {
                self.transition(&mut state, JobStatus::Running)?;
                state.started_at = Some(Local::now());
                self.publish(&state);
                info!(job_id = %self.id, command = %self.command, "Job started");
            } else if state.status != JobStatus::Running {
                return Err(ChainrunError::invalid_state_transition(
                    &self.id,
                    &state.status,
                    &JobStatus::Running,
                ));
            }
            state.executing = true;
        }

        let max_attempts = self.policy.max_attempts;

        for attempt in 0..max_attempts {
            {
                let mut state = self.state.lock();
                state.retried = attempt;
                state.attempts = attempt + 1;
            }
            metrics::record_attempt(&self.id);
            debug!(job_id = %self.id, attempt = attempt + 1, max_attempts, "Attempt started");

            match runner.run(&self.command, self.policy.timeout).await {
                Ok(RunOutcome::Exited {
                    exit_code,
                    stdout,
                    stderr,
                }) => {
                    self.write_log(&join_output(stdout, &stderr)).await;
                    return self.finish(JobStatus::Completed, Some(exit_code), None);
                }
                Ok(RunOutcome::TimedOut { partial_output }) => {
                    metrics::record_timeout(&self.id);
                    warn!(job_id = %self.id, attempt = attempt + 1, max_attempts, "Attempt timed out");

                    let mut text = partial_output;
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&format!("Error: Timed out({}/{})\n", attempt + 1, max_attempts));
                    self.write_log(&text).await;

                    if self.policy.has_next_attempt(attempt) {
                        let pause = self.policy.backoff_delay(attempt);
                        debug!(job_id = %self.id, backoff_ms = pause.as_millis() as u64, "Backing off");
                        tokio::time::sleep(pause).await;
                    }
                }
                Err(error) => {
                    warn!(job_id = %self.id, error = %error, "Command could not be launched");
                    let message = error.user_message().to_string();
                    self.write_log(&format!("Error: {}\n", message)).await;
                    return self.finish(
                        JobStatus::Completed,
                        Some(LAUNCH_FAILURE_EXIT_CODE),
                        Some(message),
                    );
                }
            }
        }

        self.finish(JobStatus::RetryOut, None, None)
    }

    /// Snapshot of the job for reporting.
    pub fn report(&self) -> JobReport {
        let state = self.state.lock();

        let elapsed_time = match (state.started_at, state.finished_at) {
            (Some(start), Some(finish)) => Some(format_elapsed(finish - start)),
            _ => None,
        };

        JobReport {
            status: state.status,
            retried: self.policy.timeout.map(|_| state.retried),
            exit_code: match state.status {
                JobStatus::Completed => state.exit_code,
                _ => None,
            },
            start_date_time: state.started_at.as_ref().map(format_timestamp),
            finish_date_time: state.finished_at.as_ref().map(format_timestamp),
            elapsed_time,
            error: state.error.clone(),
        }
    }

    fn finish(&self, status: JobStatus, exit_code: Option<i32>, error: Option<String>) -> Result<()> {
        let mut state = self.state.lock();
        self.transition(&mut state, status)?;

        state.exit_code = exit_code;
        state.error = error;
        state.finished_at = Some(Local::now());
        state.executing = false;
        self.publish(&state);
        drop(state);

        metrics::record_finished(status);
        info!(job_id = %self.id, status = %status, exit_code, "Job finished");
        Ok(())
    }

    fn transition(&self, state: &mut JobState, to: JobStatus) -> Result<()> {
        if !state.status.can_transition_to(&to) {
            return Err(ChainrunError::invalid_state_transition(&self.id, &state.status, &to));
        }
        state.status = to;
        Ok(())
    }

    fn publish(&self, state: &JobState) {
        if let Some(registry) = &self.registry {
            registry.publish(&self.id, PublishedStatus::new(state.status, state.exit_code));
        }
    }

    async fn write_log(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(sink) = &self.log_sink {
            if let Err(error) = sink.append(text).await {
                warn!(job_id = %self.id, error = %error, "Failed to write job log");
            }
        }
    }
}

/// Stdout followed by stderr, never merging the last stdout line into the
/// first stderr line.
fn join_output(stdout: String, stderr: &str) -> String {
    let mut text = stdout;
    if !text.is_empty() && !stderr.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(stderr);
    text
}
