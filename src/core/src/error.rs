//! Error handling for Chainrun Core.
//!
//! This module provides:
//! - A single error type carrying a machine-readable code and severity
//! - Structured details, including the exact identifiers a validation failed on
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use chainrun_core::error::{ChainrunError, ErrorCode, Result};
//!
//! fn read_jobs(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).map_err(|e| {
//!         ChainrunError::with_internal(ErrorCode::ContextLoadFailed, "Failed to read job file", e.to_string())
//!             .with_source(e)
//!     })
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Chainrun operations.
pub type Result<T> = std::result::Result<T, ChainrunError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Graph Errors (1000-1099)
    UnknownDependency,
    DuplicateJobId,
    DependencyCycle,

    // Job Errors (1100-1199)
    MissingRegistry,
    InvalidJobContext,
    InvalidStateTransition,

    // Execution Errors (1200-1299)
    CommandLaunchFailed,
    EmptyCommand,
    LogSinkFailed,

    // Input Errors (2000-2099)
    ContextLoadFailed,
    UnsupportedFormat,
    SerializationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,

    // Internal Errors (9000-9099)
    IoError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::UnknownDependency => 1000,
            Self::DuplicateJobId => 1001,
            Self::DependencyCycle => 1002,

            Self::MissingRegistry => 1100,
            Self::InvalidJobContext => 1101,
            Self::InvalidStateTransition => 1102,

            Self::CommandLaunchFailed => 1200,
            Self::EmptyCommand => 1201,
            Self::LogSinkFailed => 1202,

            Self::ContextLoadFailed => 2000,
            Self::UnsupportedFormat => 2001,
            Self::SerializationError => 2002,

            Self::ConfigurationError => 5000,

            Self::IoError => 9000,
        }
    }

    /// Get the error category.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "graph",
            1100..=1199 => "job",
            1200..=1299 => "execution",
            2000..=2099 => "input",
            5000..=5099 => "configuration",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// User errors (bad job files, invalid graphs)
    Low,
    /// Operational issues (a command could not be launched, a log write failed)
    Medium,
    /// System errors
    High,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::UnknownDependency
            | ErrorCode::DuplicateJobId
            | ErrorCode::DependencyCycle
            | ErrorCode::MissingRegistry
            | ErrorCode::InvalidJobContext
            | ErrorCode::InvalidStateTransition
            | ErrorCode::EmptyCommand
            | ErrorCode::ContextLoadFailed
            | ErrorCode::UnsupportedFormat
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError => Self::Low,

            ErrorCode::CommandLaunchFailed | ErrorCode::LogSinkFailed => Self::Medium,

            ErrorCode::IoError => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (job, file, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Job identifiers the error is about, in a stable order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offending_ids: Vec<String>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_offending_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.offending_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Chainrun Core.
#[derive(Error, Debug)]
pub struct ChainrunError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Human readable message
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for ChainrunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl ChainrunError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Identifiers a validation error was raised for.
    pub fn offending_ids(&self) -> &[String] {
        &self.details.offending_ids
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    offending_ids = ?self.details.offending_ids,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "chainrun_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<std::io::Error> for ChainrunError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let user_msg = match error.kind() {
            ErrorKind::NotFound => "File or resource not found",
            ErrorKind::PermissionDenied => "Permission denied",
            ErrorKind::TimedOut => "Operation timed out",
            _ => "An I/O error occurred",
        };

        Self::with_internal(ErrorCode::IoError, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for ChainrunError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::ContextLoadFailed
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string()).with_source(error)
    }
}

impl From<serde_yaml::Error> for ChainrunError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::with_internal(
            ErrorCode::ContextLoadFailed,
            "Failed to process YAML data",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<toml::de::Error> for ChainrunError {
    fn from(error: toml::de::Error) -> Self {
        Self::with_internal(
            ErrorCode::ContextLoadFailed,
            "Failed to process TOML data",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<config::ConfigError> for ChainrunError {
    fn from(error: config::ConfigError) -> Self {
        let user_msg = match &error {
            config::ConfigError::NotFound(_) => "Required configuration not found",
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => {
                "Configuration file is invalid"
            }
            _ => "Configuration error occurred",
        };

        Self::with_internal(ErrorCode::ConfigurationError, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl ChainrunError {
    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Dependencies referencing identifiers that are not part of the submission.
    pub fn unknown_dependencies(ids: &[String]) -> Self {
        Self::new(
            ErrorCode::UnknownDependency,
            format!("Dependency references unknown job ids: {}", ids.join(", ")),
        )
        .with_details(
            ErrorDetails::new()
                .with_offending_ids(ids.iter().cloned())
                .with_suggestion("Every entry in `waits` must name a job of the same submission"),
        )
    }

    /// Identifiers that occur more than once in a submission.
    pub fn duplicate_ids(ids: &[String]) -> Self {
        Self::new(
            ErrorCode::DuplicateJobId,
            format!("Job ids duplicated: {}", ids.join(", ")),
        )
        .with_details(ErrorDetails::new().with_offending_ids(ids.iter().cloned()))
    }

    /// Roots whose traversal ran into a dependency cycle.
    pub fn dependency_cycle(ids: &[String]) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!("Circular dependency reachable from: {}", ids.join(", ")),
        )
        .with_details(ErrorDetails::new().with_offending_ids(ids.iter().cloned()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Job Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// A job declares dependencies but has no status registry to evaluate them.
    pub fn missing_registry(job_id: &str) -> Self {
        Self::new(
            ErrorCode::MissingRegistry,
            format!("Job {} declares dependencies but has no status registry", job_id),
        )
        .with_details(ErrorDetails::new().with_entity("job", job_id))
    }

    /// A job context carries a value outside its allowed range.
    pub fn invalid_job_context(job_id: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidJobContext,
            format!("Invalid job context for {}: {}", job_id, reason.into()),
        )
        .with_details(ErrorDetails::new().with_entity("job", job_id))
    }

    /// Create an invalid state transition error.
    pub fn invalid_state_transition(
        job_id: &str,
        from: &crate::jobs::JobStatus,
        to: &crate::jobs::JobStatus,
    ) -> Self {
        Self::new(
            ErrorCode::InvalidStateTransition,
            format!("Invalid job state transition for {}: {:?} -> {:?}", job_id, from, to),
        )
        .with_details(ErrorDetails::new().with_entity("job", job_id))
        .with_context("from_state", format!("{:?}", from))
        .with_context("to_state", format!("{:?}", to))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn empty_command() -> Self {
        Self::new(ErrorCode::EmptyCommand, "Command line is empty")
    }

    pub fn command_launch_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        let program = program.into();
        Self::new(
            ErrorCode::CommandLaunchFailed,
            format!("Failed to launch '{}': {}", program, reason.into()),
        )
        .with_details(ErrorDetails::new().with_entity("program", &program))
    }

    pub fn log_sink_failed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        let path = path.display().to_string();
        Self::new(
            ErrorCode::LogSinkFailed,
            format!("Failed to append to log {}: {}", path, reason.into()),
        )
        .with_details(ErrorDetails::new().with_entity("log", &path))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input / Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn unsupported_format(path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        Self::new(
            ErrorCode::UnsupportedFormat,
            format!("Unsupported job file format: {}", path),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("file", &path)
                .with_suggestion("Use a .json, .yaml, .yml or .toml file"),
        )
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::DependencyCycle.category(), "graph");
        assert_eq!(ErrorCode::MissingRegistry.category(), "job");
        assert_eq!(ErrorCode::CommandLaunchFailed.category(), "execution");
        assert_eq!(ErrorCode::UnsupportedFormat.category(), "input");
        assert_eq!(ErrorCode::IoError.category(), "internal");
    }

    #[test]
    fn test_offending_ids_are_kept_in_order() {
        let error = ChainrunError::duplicate_ids(&["b".to_string(), "a".to_string()]);
        assert_eq!(error.code(), ErrorCode::DuplicateJobId);
        assert_eq!(error.offending_ids(), ["b", "a"]);
        assert!(error.user_message().contains("b, a"));
    }

    #[test]
    fn test_error_context() {
        let error = ChainrunError::new(ErrorCode::InvalidJobContext, "bad retry")
            .with_context("field", "retry")
            .with_context("value", 0);

        assert!(error.details().context.contains_key("field"));
        assert!(error.details().context.contains_key("value"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::DependencyCycle),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::CommandLaunchFailed),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::IoError),
            ErrorSeverity::High
        );
    }

    #[test]
    fn test_error_display() {
        let error = ChainrunError::with_internal(
            ErrorCode::CommandLaunchFailed,
            "Failed to launch 'foo'",
            "No such file or directory",
        );

        let display = format!("{}", error);
        assert!(display.contains("CommandLaunchFailed"));
        assert!(display.contains("Failed to launch 'foo'"));
        assert!(display.contains("No such file or directory"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: ChainrunError = io.into();
        assert_eq!(error.code(), ErrorCode::IoError);
        assert!(std::error::Error::source(&error).is_some());
    }
}
