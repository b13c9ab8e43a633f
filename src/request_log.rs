//! Append-only log of accepted requests.
//!
//! Each line is `date|time|client-ip|kind`. Every append opens the file,
//! writes one complete line with a single call, and closes it again, so
//! concurrent workers never split each other's lines.

use crate::protocol::RequestKind;
use chrono::{DateTime, Local};
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Timestamp layout for log lines
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d|%H:%M:%S";

/// Handle to the request log file
#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    /// Create the log file, truncating whatever a previous run left behind.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::File::create(&path)?;
        debug!(path = %path.display(), "Request log truncated");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one accepted request.
    ///
    /// Failures are reported on the operator log and otherwise ignored; a
    /// request is never failed because its log line could not be written.
    pub async fn append(&self, peer: IpAddr, kind: RequestKind) {
        let line = format_entry(&Local::now(), peer, kind);
        if let Err(e) = self.write_line(line.as_bytes()).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write request log");
        }
    }

    async fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

/// Render one log line, including the trailing newline.
pub fn format_entry(timestamp: &DateTime<Local>, peer: IpAddr, kind: RequestKind) -> String {
    format!("{}|{}|{}\n", timestamp.format(TIMESTAMP_FORMAT), peer, kind)
}
