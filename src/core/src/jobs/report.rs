//! Report records for single jobs and whole submissions.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::JobStatus;

/// Timestamp layout: `YYYY/MM/DD HH:MM:SS.ffffff`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub status: JobStatus,
    /// Retries performed; only reported when the job has a timeout
    pub retried: Option<u32>,
    /// Only present once the job is `Completed`
    pub exit_code: Option<i32>,
    pub start_date_time: Option<String>,
    pub finish_date_time: Option<String>,
    /// `HH:MM:SS.ffffff`
    pub elapsed_time: Option<String>,
    /// Launch failure, if the command could not be started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A job report keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReportEntry {
    pub id: String,
    #[serde(flatten)]
    pub report: JobReport,
}

/// Reports of every job of a submission, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerReport {
    pub submission_id: Option<Uuid>,
    /// Every job reached a terminal state
    pub completed: bool,
    pub error_occurred: bool,
    pub results: Vec<JobReportEntry>,
}

impl ManagerReport {
    pub fn get(&self, id: &str) -> Option<&JobReport> {
        self.results.iter().find(|entry| entry.id == id).map(|entry| &entry.report)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Format a duration as `HH:MM:SS.ffffff`. Negative durations clamp to zero.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX).max(0);

    let hours = micros / 3_600_000_000;
    let minutes = (micros / 60_000_000) % 60;
    let seconds = (micros / 1_000_000) % 60;
    let fraction = micros % 1_000_000;

    format!("{:02}:{:02}:{:02}.{:06}", hours, minutes, seconds, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(chrono::Duration::zero()), "00:00:00.000000");
        assert_eq!(
            format_elapsed(chrono::Duration::microseconds(6_000_042)),
            "00:00:06.000042"
        );
        assert_eq!(
            format_elapsed(
                chrono::Duration::hours(26) + chrono::Duration::minutes(3) + chrono::Duration::milliseconds(1500)
            ),
            "26:03:01.500000"
        );
        assert_eq!(format_elapsed(chrono::Duration::seconds(-5)), "00:00:00.000000");
    }

    #[test]
    fn test_format_timestamp() {
        let at = Local.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap()
            + chrono::Duration::microseconds(9);
        assert_eq!(format_timestamp(&at), "2023/04/05 06:07:08.000009");
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = JobReportEntry {
            id: "a".to_string(),
            report: JobReport {
                status: JobStatus::Completed,
                retried: None,
                exit_code: Some(0),
                start_date_time: None,
                finish_date_time: None,
                elapsed_time: None,
                error: None,
            },
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["status"], "Completed");
        assert_eq!(json["exitCode"], 0);
        assert!(json["retried"].is_null());
        assert!(json.get("error").is_none());
    }
}
