//! Retry policy: attempt budget, per-attempt timeout and backoff.

use std::time::Duration;

use super::JobContext;
use crate::error::{ChainrunError, Result};

/// Configuration for job retry behavior.
///
/// Only timeouts are retried; a command that exits, whatever its code, ends
/// the job.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts (1 = no retry)
    pub max_attempts: u32,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    /// Linear floor added to every backoff sleep, in time units
    pub delay_units: f64,
    /// Exponent applied to the 1-based attempt number
    pub backoff_exponent: f64,
    /// Length of one time unit
    pub time_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            timeout: None,
            delay_units: 0.0,
            backoff_exponent: 1.0,
            time_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from a context, rejecting out-of-range values.
    pub fn from_context(context: &JobContext, time_unit: Duration) -> Result<Self> {
        let id = context.id.as_str();

        if context.retry == 0 {
            return Err(ChainrunError::invalid_job_context(id, "retry must be at least 1")
                .with_context("retry", context.retry));
        }
        if !context.delay.is_finite() || context.delay < 0.0 {
            return Err(ChainrunError::invalid_job_context(id, "delay must be a non-negative number")
                .with_context("delay", context.delay));
        }
        if !context.backoff.is_finite() || context.backoff < 0.0 {
            return Err(ChainrunError::invalid_job_context(id, "backoff must be a non-negative number")
                .with_context("backoff", context.backoff));
        }

        let timeout = match context.timeout {
            None => None,
            Some(units) if units.is_finite() && units > 0.0 => Some(units_to_duration(units, time_unit)),
            Some(units) => {
                return Err(ChainrunError::invalid_job_context(id, "timeout must be a positive number")
                    .with_context("timeout", units));
            }
        };

        Ok(Self {
            max_attempts: context.retry,
            timeout,
            delay_units: context.delay,
            backoff_exponent: context.backoff,
            time_unit,
        })
    }

    /// Sleep inserted after the timed-out attempt `attempt` (0-indexed):
    /// `(attempt + 1) ^ backoff + delay` time units.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let units = (f64::from(attempt) + 1.0).powf(self.backoff_exponent) + self.delay_units;
        units_to_duration(units, self.time_unit)
    }

    /// Whether another attempt follows attempt `attempt` (0-indexed).
    pub fn has_next_attempt(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

fn units_to_duration(units: f64, time_unit: Duration) -> Duration {
    let nanos = (units * time_unit.as_nanos() as f64).round();
    if nanos.is_finite() && nanos < u64::MAX as f64 {
        Duration::from_nanos(nanos as u64)
    } else {
        Duration::MAX
    }
}
