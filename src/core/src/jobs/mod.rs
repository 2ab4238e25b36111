//! Jobs: the unit of work and its lifecycle.
//!
//! - **JobContext**: parsed, immutable description of one job
//! - **JobStatus**: lifecycle states and the transition table
//! - **RetryPolicy**: attempt budget, per-attempt timeout and backoff
//! - **Job**: the state machine that runs the attempt loop
//! - **StatusBoard**: the shared, lock-guarded map jobs publish into
//! - **JobReport / ManagerReport**: reporting records
//!
//! # Lifecycle
//!
//! ```text
//!                 ┌──────────────▶ Completed   (exit code recorded, not retried)
//!   Ready ──▶ Running
//!                 └──────────────▶ RetryOut    (every attempt timed out)
//!
//!   timeout on attempt i (0-based):
//!       log partial output + "Error: Timed out(i+1/max)"
//!       sleep ((i + 1) ^ backoff + delay) time units
//!       next attempt
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use chainrun_core::jobs::{Job, JobContext, StatusBoard};
//! use chainrun_core::runner::ProcessRunner;
//!
//! let board = Arc::new(StatusBoard::new());
//! let context = JobContext::new("build", "make").with_timeout(60.0).with_retry(3);
//! let job = Arc::new(Job::configure(&context, Duration::from_secs(1), Some(board))?);
//!
//! if job.is_ready() {
//!     job.spawn(Arc::new(ProcessRunner::new()))?.await?;
//! }
//! ```

pub mod context;
pub mod job;
pub mod policy;
pub mod registry;
pub mod report;
pub mod status;

pub use context::{CommandLine, JobContext};
pub use job::{Job, LAUNCH_FAILURE_EXIT_CODE};
pub use policy::RetryPolicy;
pub use registry::{PublishedStatus, StatusBoard};
pub use report::{format_elapsed, format_timestamp, JobReport, JobReportEntry, ManagerReport, TIMESTAMP_FORMAT};
pub use status::JobStatus;
