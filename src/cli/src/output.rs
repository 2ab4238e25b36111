//! Output formatting utilities for the Chainrun CLI.
//!
//! Supports table, JSON, and YAML output formats.

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Output format selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Render as a formatted table
    #[default]
    Table,
    /// Render as JSON
    Json,
    /// Render as YAML
    Yaml,
}

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Print a list of rows as a table, or the serializable value as JSON/YAML.
pub fn print_rows<T: Tabled, S: Serialize + ?Sized>(rows: &[T], value: &S, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No jobs.".dimmed());
                return Ok(());
            }
            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Columns::first()).with(Alignment::left()))
                .to_string();
            println!("{}", table);
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Yaml => print_item(value, format),
    }
}

/// Print a single item in the requested format.
pub fn print_item<T: Serialize + ?Sized>(item: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(item)?);
        }
    }
    Ok(())
}

/// Print key-value details to the terminal.
pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a section header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

/// `-` for absent values in table cells.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
