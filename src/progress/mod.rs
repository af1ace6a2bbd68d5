//! Progress log
//!
//! Every fetch attempt appends one whitespace-separated line:
//!
//! ```text
//! 2024-03-09T12:00:00Z allrecipes ok 200 https://allrecipes.com/recipe/6663
//! ```
//!
//! The dispatched URL is always the last field, so recovery can find the
//! numeric ID at the end of the line and the visited-link scan can treat
//! every word as a candidate link.

mod recovery;

pub use recovery::{
    derive_id_pattern, id_pattern, recover_start_ids, scan_max_ids, visited_links, ID_PLACEHOLDER,
};

use crate::Result;
use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// How a fetch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200
    Ok,
    /// Any other HTTP status
    Invalid,
    /// Connection failure or timeout
    Transient,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Invalid => "invalid",
            Self::Transient => "transient",
        })
    }
}

/// Append-only writer for the progress log
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ProgressLog {
    /// Opens (creating if needed) the log for appending
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one attempt line
    pub async fn record(
        &self,
        site: &str,
        outcome: FetchOutcome,
        status: Option<u16>,
        url: &str,
    ) -> Result<()> {
        let line = format_line(site, outcome, status, url);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_line(site: &str, outcome: FetchOutcome, status: Option<u16>, url: &str) -> String {
    let status = status.map_or_else(|| "-".to_string(), |s| s.to_string());
    format!(
        "{} {} {} {} {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        site,
        outcome,
        status,
        url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_line() {
        let line = format_line(
            "allrecipes",
            FetchOutcome::Invalid,
            Some(404),
            "https://allrecipes.com/recipe/9",
        );
        let fields: Vec<&str> = line.split_whitespace().collect();

        assert_eq!(fields.len(), 5);
        assert_eq!(&fields[1..], ["allrecipes", "invalid", "404", "https://allrecipes.com/recipe/9"]);
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_transient_has_no_status() {
        let line = format_line("food", FetchOutcome::Transient, None, "http://food.com/r");
        assert!(line.contains(" transient - http://food.com/r"));
    }

    #[tokio::test]
    async fn test_record_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log").join("progress.log");

        let log = ProgressLog::open(&path).await.unwrap();
        log.record("a", FetchOutcome::Ok, Some(200), "https://a.com/r/1")
            .await
            .unwrap();
        drop(log);

        let log = ProgressLog::open(&path).await.unwrap();
        log.record("a", FetchOutcome::Ok, Some(200), "https://a.com/r/2")
            .await
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("https://a.com/r/1"));
        assert!(lines[1].ends_with("https://a.com/r/2"));
    }
}
