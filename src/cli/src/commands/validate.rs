//! `chainrun validate`: check a job file without running it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chainrun_core::config::ChainrunConfig;
use chainrun_core::dag::{ExecutionPlan, GraphValidator, ValidationReport};
use chainrun_core::jobs::{Job, JobContext, StatusBoard};
use chainrun_core::loader;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Job file (.json, .yaml, .yml or .toml)
    pub file: PathBuf,
}

#[derive(Tabled)]
struct WaveRow {
    #[tabled(rename = "Wave")]
    wave: usize,
    #[tabled(rename = "Jobs")]
    jobs: String,
}

/// A context the manager would refuse to build a job from.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct ContextProblem {
    id: String,
    reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationOutput<'a> {
    #[serde(flatten)]
    graph: &'a ValidationReport,
    invalid_contexts: &'a [ContextProblem],
}

/// Build every context the way `submit` does, against a scratch board.
fn context_problems(contexts: &[JobContext], time_unit: Duration) -> Vec<ContextProblem> {
    let board = Arc::new(StatusBoard::new());
    contexts
        .iter()
        .filter_map(|context| {
            Job::configure(context, time_unit, Some(Arc::clone(&board)))
                .err()
                .map(|error| ContextProblem {
                    id: context.id.clone(),
                    reason: error.user_message().to_string(),
                })
        })
        .collect()
}

/// Returns whether the job file is valid.
pub fn execute(args: ValidateArgs, config: &ChainrunConfig, format: OutputFormat) -> Result<bool> {
    let contexts = loader::load_contexts(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let report = GraphValidator::inspect(&contexts);
    let problems = context_problems(&contexts, config.manager.time_unit());

    if !report.is_valid() || !problems.is_empty() {
        match format {
            OutputFormat::Table => {
                output::print_header("Validation failed");
                let categories = [
                    ("Unknown dependencies", &report.unknown_dependencies),
                    ("Duplicate ids", &report.duplicate_ids),
                    ("Cycles reachable from", &report.cyclic_roots),
                ];
                for (label, ids) in categories {
                    if !ids.is_empty() {
                        output::print_detail(label, &ids.join(", "));
                    }
                }
                for problem in &problems {
                    output::print_detail(&format!("Invalid job {}", problem.id), &problem.reason);
                }
            }
            OutputFormat::Json | OutputFormat::Yaml => output::print_item(
                &ValidationOutput {
                    graph: &report,
                    invalid_contexts: &problems,
                },
                format,
            )?,
        }
        return Ok(false);
    }

    let plan = ExecutionPlan::build(&contexts)?;
    let rows: Vec<WaveRow> = plan
        .waves()
        .iter()
        .enumerate()
        .map(|(wave, jobs)| WaveRow {
            wave,
            jobs: jobs.join(", "),
        })
        .collect();
    output::print_rows(&rows, &plan, format)?;

    if matches!(format, OutputFormat::Table) {
        output::print_success(&format!("{} jobs in {} waves", contexts.len(), plan.len()));
    }
    Ok(true)
}
