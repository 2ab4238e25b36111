//! CLI subcommands.

pub mod run;
pub mod validate;
