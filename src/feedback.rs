//! Append-only feedback log.
//!
//! Each submission becomes exactly one line:
//!
//! ```text
//! Response: <answer> | Feedback: <feedback>
//! ```
//!
//! Line breaks inside either field are written as the two characters `\n`
//! so a multi-line answer still occupies a single line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination for user feedback about an answer.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, answer: &str, feedback: &str) -> Result<()>;
}

/// Format one log line, including the trailing newline.
pub fn format_record(answer: &str, feedback: &str) -> String {
    format!(
        "Response: {} | Feedback: {}\n",
        single_line(answer),
        single_line(feedback)
    )
}

fn single_line(s: &str) -> String {
    s.replace('\r', "").replace('\n', "\\n")
}

/// Appends records to a flat text file.
pub struct FileFeedbackSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileFeedbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every line written so far. A missing file has no lines.
    pub async fn read_lines(&self) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }
}

#[async_trait]
impl FeedbackSink for FileFeedbackSink {
    async fn record(&self, answer: &str, feedback: &str) -> Result<()> {
        let line = format_record(answer, feedback);
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open feedback log {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %self.path.display(), "feedback recorded");
        Ok(())
    }
}
