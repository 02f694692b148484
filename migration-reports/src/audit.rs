//! Run-scoped audit log
//!
//! Entries are appended as `[timestamp] [LEVEL] message` lines and mirrored
//! to the console through `tracing`. The file is opened in append mode and
//! never truncated, so consecutive runs share one trail.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{ReportError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Audit severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditLevel::Info => write!(f, "INFO"),
            AuditLevel::Warn => write!(f, "WARN"),
            AuditLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for AuditLevel {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INFO" => Ok(AuditLevel::Info),
            "WARN" => Ok(AuditLevel::Warn),
            "ERROR" => Ok(AuditLevel::Error),
            other => Err(ReportError::Config(format!("Unknown audit level: {}", other))),
        }
    }
}

/// One line of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: NaiveDateTime,
    pub level: AuditLevel,
    pub message: String,
}

impl AuditEntry {
    pub fn new(level: AuditLevel, message: &str) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            level,
            message: single_line(message),
        }
    }
}

impl std::fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.message
        )
    }
}

impl std::str::FromStr for AuditEntry {
    type Err = ReportError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || ReportError::Config(format!("Malformed audit line: {}", line));

        let rest = line.strip_prefix('[').ok_or_else(malformed)?;
        let (timestamp, rest) = rest.split_once("] [").ok_or_else(malformed)?;
        let (level, message) = rest.split_once(']').ok_or_else(malformed)?;

        Ok(Self {
            timestamp: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
                .map_err(|_| malformed())?,
            level: level.parse()?,
            message: message.strip_prefix(' ').unwrap_or(message).to_string(),
        })
    }
}

/// Entry counts per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCounts {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
}

impl std::fmt::Display for AuditCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} info, {} warning(s), {} error(s)",
            self.info, self.warn, self.error
        )
    }
}

/// Append-only audit trail
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
    info: AtomicUsize,
    warn: AtomicUsize,
    error: AtomicUsize,
}

impl AuditLog {
    /// Open (or create) the log, creating its parent directory if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            info: AtomicUsize::new(0),
            warn: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn info(&self, message: impl AsRef<str>) -> Result<()> {
        self.record(AuditLevel::Info, message.as_ref()).await
    }

    pub async fn warn(&self, message: impl AsRef<str>) -> Result<()> {
        self.record(AuditLevel::Warn, message.as_ref()).await
    }

    pub async fn error(&self, message: impl AsRef<str>) -> Result<()> {
        self.record(AuditLevel::Error, message.as_ref()).await
    }

    /// Append one entry; the whole line goes out in a single write
    pub async fn record(&self, level: AuditLevel, message: &str) -> Result<()> {
        let entry = AuditEntry::new(level, message);

        match level {
            AuditLevel::Info => {
                self.info.fetch_add(1, Ordering::Relaxed);
                info!(target: "audit", "{}", entry.message);
            }
            AuditLevel::Warn => {
                self.warn.fetch_add(1, Ordering::Relaxed);
                warn!(target: "audit", "{}", entry.message);
            }
            AuditLevel::Error => {
                self.error.fetch_add(1, Ordering::Relaxed);
                error!(target: "audit", "{}", entry.message);
            }
        }

        let line = format!("{}\n", entry);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn counts(&self) -> AuditCounts {
        AuditCounts {
            info: self.info.load(Ordering::Relaxed),
            warn: self.warn.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
        }
    }
}

/// Read every entry of an audit log
pub async fn read_entries(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>> {
    let content = fs::read_to_string(path).await?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
