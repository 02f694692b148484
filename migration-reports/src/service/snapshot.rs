//! Offline backend reading captured JSON documents
//!
//! Files are named `<Kind>_<identity>.json`, keyed by the identity each
//! query is made with (mailbox, batch name or endpoint identity);
//! the tenant-wide config lives in `MigrationConfig.json`. Exported batches
//! are keyed by mailbox instead, so a batch missing under its own name is
//! looked up by the `Identity` inside each `MigrationBatch_*.json` file.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::MigrationService;
use crate::error::{ReportError, Result};
use crate::records::{
    MailboxIdentity, MailboxStatistics, MigrationBatch, MigrationConfig,
    MigrationEndpoint, MigrationUser, MigrationUserStatistics, MoveRequest,
    MoveRequestStatistics, Record, RecordKind,
};

pub struct SnapshotService {
    dir: PathBuf,
}

impl SnapshotService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file holding `kind` for `identity`
    pub fn path_for(&self, kind: RecordKind, identity: Option<&str>) -> PathBuf {
        self.dir.join(kind.file_name(identity))
    }

    async fn load<R: Record>(&self, identity: Option<&str>) -> Result<Option<R>> {
        self.load_path(&self.path_for(R::KIND, identity)).await
    }

    /// Search mailbox-keyed batch exports for `batch_name`
    async fn find_batch(&self, batch_name: &str) -> Result<Option<MigrationBatch>> {
        let prefix = format!("{}_", RecordKind::MigrationBatch.file_stem());
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ReportError::Service(format!(
                    "Failed to list {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                candidates.push(entry.path());
            }
        }
        candidates.sort();

        for path in candidates {
            if let Some(batch) = self.load_path::<MigrationBatch>(&path).await? {
                if batch
                    .name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(batch_name))
                {
                    debug!("Batch {} found in {}", batch_name, path.display());
                    return Ok(Some(batch));
                }
            }
        }

        Ok(None)
    }

    async fn load_path<R: Record>(&self, path: &Path) -> Result<Option<R>> {
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(ReportError::Service(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ReportError::Service(format!("Malformed snapshot {}: {}", path.display(), e))
        })?;

        match value {
            Value::Null => Ok(None),
            Value::Array(items) => match items.into_iter().next() {
                Some(first) => R::from_value(first).map(Some),
                None => Ok(None),
            },
            value => R::from_value(value).map(Some),
        }
    }
}

#[async_trait::async_trait]
impl MigrationService for SnapshotService {
    async fn move_request(&self, mailbox: &MailboxIdentity) -> Result<Option<MoveRequest>> {
        self.load(Some(mailbox.as_str())).await
    }

    async fn move_request_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MoveRequestStatistics>> {
        self.load(Some(mailbox.as_str())).await
    }

    async fn migration_user(&self, mailbox: &MailboxIdentity) -> Result<Option<MigrationUser>> {
        self.load(Some(mailbox.as_str())).await
    }

    async fn migration_user_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MigrationUserStatistics>> {
        self.load(Some(mailbox.as_str())).await
    }

    async fn migration_batch(&self, batch_name: &str) -> Result<Option<MigrationBatch>> {
        match self.load(Some(batch_name)).await? {
            Some(batch) => Ok(Some(batch)),
            None => self.find_batch(batch_name).await,
        }
    }

    async fn migration_endpoint(&self, endpoint: &str) -> Result<Option<MigrationEndpoint>> {
        self.load(Some(endpoint)).await
    }

    async fn migration_config(&self) -> Result<Option<MigrationConfig>> {
        self.load(None).await
    }

    async fn mailbox_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MailboxStatistics>> {
        self.load(Some(mailbox.as_str())).await
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}
