//! `chainrun run`: submit a job file and drive it to completion.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chainrun_core::config::ChainrunConfig;
use chainrun_core::jobs::{JobReportEntry, JobStatus};
use chainrun_core::manager::Manager;
use clap::Args;
use colored::*;
use tabled::Tabled;

use crate::output::{self, or_dash, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Job file (.json, .yaml, .yml or .toml)
    pub file: PathBuf,

    /// Directory receiving one `<id>.log` per job
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Interval between readiness scans, in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Length of one time unit (timeout, delay, backoff), in milliseconds
    #[arg(long)]
    pub time_unit_ms: Option<u64>,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Exit")]
    exit_code: String,
    #[tabled(rename = "Retried")]
    retried: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Finished")]
    finished: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
}

impl From<&JobReportEntry> for JobRow {
    fn from(entry: &JobReportEntry) -> Self {
        let report = &entry.report;
        Self {
            id: entry.id.clone(),
            status: colorize_status(report.status, report.exit_code),
            exit_code: or_dash(report.exit_code),
            retried: or_dash(report.retried),
            started: or_dash(report.start_date_time.as_deref()),
            finished: or_dash(report.finish_date_time.as_deref()),
            elapsed: or_dash(report.elapsed_time.as_deref()),
        }
    }
}

fn colorize_status(status: JobStatus, exit_code: Option<i32>) -> String {
    match (status, exit_code) {
        (JobStatus::Completed, Some(0)) => status.to_string().green().to_string(),
        (JobStatus::Completed, _) | (JobStatus::RetryOut, _) => status.to_string().red().to_string(),
        (JobStatus::Running, _) => status.to_string().yellow().to_string(),
        (JobStatus::Ready, _) => status.to_string().dimmed().to_string(),
    }
}

/// Returns whether every job completed without error.
pub async fn execute(args: RunArgs, config: &ChainrunConfig, format: OutputFormat) -> Result<bool> {
    let mut manager_config = config.manager.clone();
    if let Some(dir) = args.log_dir {
        manager_config = manager_config.with_log_output_directory(dir);
    }
    if let Some(ms) = args.poll_ms {
        manager_config = manager_config.with_poll_interval_ms(ms);
    }
    if let Some(ms) = args.time_unit_ms {
        manager_config = manager_config.with_time_unit_ms(ms);
    }

    let mut manager = Manager::new(manager_config);
    manager
        .submit_file(&args.file)
        .await
        .with_context(|| format!("failed to submit {}", args.file.display()))?;

    let report = manager.run().await;
    let rows: Vec<JobRow> = report.results.iter().map(JobRow::from).collect();
    output::print_rows(&rows, &report, format)?;

    let stuck = manager.stuck_jobs();
    if !stuck.is_empty() {
        output::print_warning(&format!("Never started (failed dependency): {}", stuck.join(", ")));
    }

    let success = report.completed && !report.error_occurred;
    if success {
        if matches!(format, OutputFormat::Table) {
            output::print_success(&format!("{} jobs completed", report.len()));
        }
    } else {
        output::print_error("One or more jobs failed");
    }
    Ok(success)
}
