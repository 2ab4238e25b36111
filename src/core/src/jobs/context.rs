//! Job contexts: the immutable, already-parsed description of one job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The command a job runs.
///
/// A plain string goes through the platform shell; an argument vector is
/// executed directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Args(Vec<String>),
}

impl CommandLine {
    pub fn shell(line: impl Into<String>) -> Self {
        Self::Shell(line.into())
    }

    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Args(args.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(line) => line.trim().is_empty(),
            Self::Args(args) => args.first().map_or(true, |program| program.is_empty()),
        }
    }

    /// First token of the command, used in diagnostics.
    pub fn program(&self) -> &str {
        match self {
            Self::Shell(line) => line.split_whitespace().next().unwrap_or(""),
            Self::Args(args) => args.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(line) => f.write_str(line),
            Self::Args(args) => f.write_str(&args.join(" ")),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        Self::Shell(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        Self::Shell(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

/// Description of one job as produced by a loader.
///
/// Durations (`timeout`, `delay`) are expressed in time units; the manager
/// decides how long one unit is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    /// Identifier, unique within a submission
    pub id: String,

    #[serde(alias = "commandLine")]
    pub command: CommandLine,

    /// Per-attempt timeout; `None` waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Total number of attempts (1 = no retry)
    #[serde(default = "default_retry", alias = "maxAttempts")]
    pub retry: u32,

    /// Linear floor added to every backoff sleep
    #[serde(default)]
    pub delay: f64,

    /// Backoff exponent
    #[serde(default = "default_backoff")]
    pub backoff: f64,

    /// Identifiers this job waits for
    #[serde(default, alias = "waiting", skip_serializing_if = "Vec::is_empty")]
    pub waits: Vec<String>,

    /// Directory receiving `<id>.log`; inherits the manager default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_output_directory: Option<PathBuf>,
}

fn default_retry() -> u32 { 1 }
fn default_backoff() -> f64 { 1.0 }

impl JobContext {
    /// Create a context with default policy: one attempt, no timeout, no dependencies.
    pub fn new(id: impl Into<String>, command: impl Into<CommandLine>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            timeout: None,
            retry: default_retry(),
            delay: 0.0,
            backoff: default_backoff(),
            waits: Vec::new(),
            log_output_directory: None,
        }
    }

    pub fn with_timeout(mut self, units: f64) -> Self {
        self.timeout = Some(units);
        self
    }

    pub fn with_retry(mut self, max_attempts: u32) -> Self {
        self.retry = max_attempts;
        self
    }

    pub fn with_delay(mut self, units: f64) -> Self {
        self.delay = units;
        self
    }

    pub fn with_backoff(mut self, exponent: f64) -> Self {
        self.backoff = exponent;
        self
    }

    pub fn waits<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.waits = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_output_directory = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let context: JobContext =
            serde_json::from_str(r#"{ "id": "a", "command": "sleep 1" }"#).unwrap();

        assert_eq!(context, JobContext::new("a", "sleep 1"));
        assert_eq!(context.retry, 1);
        assert_eq!(context.delay, 0.0);
        assert_eq!(context.backoff, 1.0);
        assert!(context.timeout.is_none());
        assert!(context.waits.is_empty());
    }

    #[test]
    fn test_aliases() {
        let context: JobContext = serde_json::from_str(
            r#"{
                "id": "d",
                "commandLine": ["sleep", "2"],
                "maxAttempts": 3,
                "waiting": ["b", "c"],
                "logOutputDirectory": "logs"
            }"#,
        )
        .unwrap();

        assert_eq!(context.command, CommandLine::args(["sleep", "2"]));
        assert_eq!(context.retry, 3);
        assert_eq!(context.waits, vec!["b", "c"]);
        assert_eq!(context.log_output_directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_integer_durations_are_accepted() {
        let context: JobContext = serde_json::from_str(
            r#"{ "id": "a", "command": "x", "timeout": 3, "delay": 2, "backoff": 2 }"#,
        )
        .unwrap();
        assert_eq!(context.timeout, Some(3.0));
        assert_eq!(context.delay, 2.0);
        assert_eq!(context.backoff, 2.0);
    }

    #[test]
    fn test_command_line_helpers() {
        assert!(CommandLine::shell("   ").is_empty());
        assert!(CommandLine::Args(vec![]).is_empty());
        assert!(CommandLine::args([""]).is_empty());
        assert!(!CommandLine::shell("true").is_empty());

        assert_eq!(CommandLine::shell("sleep 3").program(), "sleep");
        assert_eq!(CommandLine::args(["echo", "hi"]).to_string(), "echo hi");
    }
}
