#![allow(clippy::result_large_err)]
//! # Chainrun Core
//!
//! Dependency-driven job orchestration.
//!
//! ## Architecture
//!
//! - **Graph validation**: unknown references, duplicate ids and cycles are rejected before any job exists
//! - **Jobs**: a small state machine per command with timeout, retry and backoff
//! - **Manager**: starts ready jobs concurrently and aggregates their status through one lock-guarded board
//! - **Runner**: child-process execution with partial output capture and process-group kill on timeout
//! - **Loader**: JSON, YAML and TOML job files
//! - **Observability**: structured logging and metrics

pub mod config;
pub mod dag;
pub mod error;
pub mod jobs;
pub mod loader;
pub mod manager;
pub mod observability;
pub mod runner;
pub mod sink;

pub use error::{ChainrunError, Result, ErrorCode, ErrorDetails, ErrorSeverity};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ChainrunConfig, ManagerConfig, LoggingConfig, LogFormat};
    pub use crate::dag::{GraphValidator, ValidationReport, ExecutionPlan};
    pub use crate::jobs::{
        CommandLine, Job, JobContext, JobStatus, RetryPolicy,
        JobReport, JobReportEntry, ManagerReport,
        PublishedStatus, StatusBoard,
    };
    pub use crate::manager::Manager;
    pub use crate::runner::{CommandRunner, ProcessRunner, RunOutcome};
    pub use crate::sink::LogSink;
    pub use crate::error::{ChainrunError, Result, ErrorCode, ErrorDetails, ErrorSeverity};
}
