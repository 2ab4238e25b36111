//! Observability: structured logging and metrics.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the logging stack and describe the chainrun counters.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a global
/// subscriber was already installed, which is harmless.
pub fn init(config: &LoggingConfig) -> bool {
    metrics::register_metrics();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    result.is_ok()
}

/// Metrics registry and helpers.
pub mod metrics {
    use ::metrics::{counter, describe_counter};

    use crate::jobs::JobStatus;

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "chainrun_submissions_total",
            "Total number of accepted job graph submissions"
        );
        describe_counter!(
            "chainrun_job_attempts_total",
            "Total number of command attempts"
        );
        describe_counter!(
            "chainrun_job_timeouts_total",
            "Total number of attempts cancelled by timeout"
        );
        describe_counter!(
            "chainrun_jobs_finished_total",
            "Total number of jobs that reached a terminal state"
        );
        describe_counter!(
            "chainrun_errors_total",
            "Total number of errors constructed"
        );
    }

    pub fn record_submission(jobs: usize) {
        counter!("chainrun_submissions_total").increment(1);
        tracing::trace!(jobs, "submission recorded");
    }

    pub fn record_attempt(job_id: &str) {
        counter!("chainrun_job_attempts_total", "job" => job_id.to_string()).increment(1);
    }

    pub fn record_timeout(job_id: &str) {
        counter!("chainrun_job_timeouts_total", "job" => job_id.to_string()).increment(1);
    }

    pub fn record_finished(status: JobStatus) {
        counter!("chainrun_jobs_finished_total", "status" => status.to_string()).increment(1);
    }
}
