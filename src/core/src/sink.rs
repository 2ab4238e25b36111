//! Per-job log files.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{ChainrunError, Result};

/// Append-only text log backing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<job_id>.log`
    pub fn for_job(dir: impl AsRef<Path>, job_id: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{}.log", job_id)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text`, creating the parent directory on first use.
    pub async fn append(&self, text: &str) -> Result<()> {
        let fail = |e: std::io::Error| ChainrunError::log_sink_failed(&self.path, e.to_string()).with_source(e);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(fail)?;
        file.write_all(text.as_bytes()).await.map_err(fail)?;
        file.flush().await.map_err(fail)?;
        Ok(())
    }
}
