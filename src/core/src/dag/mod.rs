//! Dependency graph checks and planning.
//!
//! This module handles:
//! - Well-formedness of a submission: unknown references, duplicate ids, cycles
//! - Layering a valid submission into waves of jobs that may run together
//!
//! Edges run from a dependent job to each job it waits for.

mod plan;
mod validator;

pub use plan::ExecutionPlan;
pub use validator::{GraphValidator, ValidationReport};
