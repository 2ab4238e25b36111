//! Job file loading.
//!
//! Accepted shapes are a bare list of contexts or a table with a `jobs` list.
//! TOML has no top-level arrays, so TOML files always use `[[jobs]]`.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ChainrunError, ErrorCode, Result};
use crate::jobs::JobContext;

/// Serialization format of a job file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    Json,
    Yaml,
    Toml,
}

impl ContextFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ChainrunError::unsupported_format(path)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    List(Vec<JobContext>),
    Table { jobs: Vec<JobContext> },
}

impl Document {
    fn into_contexts(self) -> Vec<JobContext> {
        match self {
            Self::List(jobs) | Self::Table { jobs } => jobs,
        }
    }
}

/// Read job contexts from a file, picking the format from its extension.
pub fn load_contexts(path: impl AsRef<Path>) -> Result<Vec<JobContext>> {
    let path = path.as_ref();
    let format = ContextFormat::from_path(path)?;

    let text = std::fs::read_to_string(path).map_err(|e| {
        ChainrunError::with_internal(
            ErrorCode::ContextLoadFailed,
            format!("Failed to read job file {}", path.display()),
            e.to_string(),
        )
        .with_source(e)
    })?;

    let contexts = parse_contexts(&text, format)?;
    debug!(path = %path.display(), jobs = contexts.len(), "Job file loaded");
    Ok(contexts)
}

/// Parse job contexts from in-memory text.
pub fn parse_contexts(text: &str, format: ContextFormat) -> Result<Vec<JobContext>> {
    let document: Document = match format {
        ContextFormat::Json => serde_json::from_str(text)?,
        ContextFormat::Yaml => serde_yaml::from_str(text)?,
        ContextFormat::Toml => toml::from_str(text)?,
    };
    Ok(document.into_contexts())
}
