//! Per-mailbox report pipeline
//!
//! - [`collector`]: queries the service and gathers the record set
//! - [`exporter`]: writes each present record as a JSON document
//! - [`summary`]: renders the plain-text failure summary
//! - [`runner`]: drives the pipeline over every requested mailbox

pub mod collector;
pub mod exporter;
pub mod runner;
pub mod summary;

pub use collector::Collector;
pub use exporter::{ExportOutcome, Exporter};
pub use runner::{MailboxOutcome, OutcomeStatus, ReportRunner, RunReport};
pub use summary::{FailureGroup, FailureSummary};

use std::path::Path;
use tokio::fs;

/// Write a whole file through a sibling temporary file
///
/// The target only ever holds complete content; the temporary file is
/// removed if the final rename fails.
pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp_path, contents).await?;

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");

        write_file(&path, b"first").await.unwrap();
        write_file(&path, b"second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join(".out.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_file_onto_directory_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.json");
        std::fs::create_dir(&path).unwrap();

        assert!(write_file(&path, b"data").await.is_err());
        assert!(!dir.path().join(".blocked.json.tmp").exists());
    }
}
