//! Shared test doubles.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chainrun_core::jobs::{CommandLine, JobContext};
use chainrun_core::runner::{CommandRunner, RunOutcome};
use chainrun_core::{ChainrunError, Result};
use parking_lot::Mutex;

/// What one scripted attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Sleep, then exit with a code and some stdout
    Exit { code: i32, after: Duration, stdout: String },
    /// Sleep for the whole timeout, then report a timeout with partial output
    Timeout { partial: String },
    /// Fail to launch
    LaunchFailure,
}

impl Step {
    pub fn exit(code: i32) -> Self {
        Self::Exit { code, after: Duration::ZERO, stdout: String::new() }
    }

    pub fn exit_after(code: i32, after: Duration) -> Self {
        Self::Exit { code, after, stdout: String::new() }
    }

    pub fn exit_with_output(code: i32, stdout: &str) -> Self {
        Self::Exit { code, after: Duration::ZERO, stdout: stdout.to_string() }
    }

    pub fn timeout() -> Self {
        Self::Timeout { partial: String::new() }
    }

    pub fn timeout_with_output(partial: &str) -> Self {
        Self::Timeout { partial: partial.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub command: String,
    pub phase: Phase,
    pub at: Instant,
}

/// A `CommandRunner` that plays back scripted attempts per command text.
///
/// Unscripted attempts exit 0 immediately.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, u32>>,
    events: Mutex<Vec<Event>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, command: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().insert(command.to_string(), steps.into());
        self
    }

    pub fn calls(&self, command: &str) -> u32 {
        self.calls.lock().get(command).copied().unwrap_or(0)
    }

    pub fn first(&self, command: &str, phase: Phase) -> Option<Instant> {
        self.events
            .lock()
            .iter()
            .find(|e| e.command == command && e.phase == phase)
            .map(|e| e.at)
    }

    pub fn last(&self, command: &str, phase: Phase) -> Option<Instant> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|e| e.command == command && e.phase == phase)
            .map(|e| e.at)
    }

    /// Every timestamp of `phase` for `command`, in attempt order.
    pub fn times(&self, command: &str, phase: Phase) -> Vec<Instant> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.command == command && e.phase == phase)
            .map(|e| e.at)
            .collect()
    }

    fn record(&self, command: &str, phase: Phase) {
        self.events.lock().push(Event {
            command: command.to_string(),
            phase,
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<RunOutcome> {
        let key = command.to_string();
        *self.calls.lock().entry(key.clone()).or_default() += 1;
        let step = self
            .scripts
            .lock()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Step::exit(0));

        self.record(&key, Phase::Start);
        let outcome = match step {
            Step::Exit { code, after, stdout } => {
                tokio::time::sleep(after).await;
                Ok(RunOutcome::Exited { exit_code: code, stdout, stderr: String::new() })
            }
            Step::Timeout { partial } => {
                tokio::time::sleep(timeout.unwrap_or(Duration::ZERO)).await;
                Ok(RunOutcome::TimedOut { partial_output: partial })
            }
            Step::LaunchFailure => Err(ChainrunError::command_launch_failed(key.as_str(), "scripted")),
        };
        self.record(&key, Phase::End);
        outcome
    }
}

/// Context whose command text is its own id.
pub fn job(id: &str, waits: &[&str]) -> JobContext {
    JobContext::new(id, id).waits(waits.iter().copied())
}
