//! Structured export of collected records
//!
//! Each present record becomes one pretty-printed JSON document in the
//! output directory. Absent records are skipped without a file; the
//! collector has already audited their absence. A write failure is audited
//! and aborts the remaining exports for the mailbox. The tenant-wide config
//! is written once per run.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::write_file;
use crate::audit::AuditLog;
use crate::error::Result;
use crate::records::{MailboxRecords, Record, RecordKind};

/// Files written and kinds skipped for one mailbox
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOutcome {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<RecordKind>,
}

pub struct Exporter {
    output_dir: PathBuf,
    config_exported: bool,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            config_exported: false,
        }
    }

    /// Start a new run; the config is written again on its first export
    pub fn begin_run(&mut self) {
        self.config_exported = false;
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export every present record of `records`
    ///
    /// Paths land in `outcome` as they are written, so a failed export
    /// still lists the files that made it to disk.
    pub async fn export(
        &mut self,
        records: &MailboxRecords,
        audit: &AuditLog,
        outcome: &mut ExportOutcome,
    ) -> Result<()> {
        if !self.output_dir.exists() {
            if let Err(e) = fs::create_dir_all(&self.output_dir).await {
                audit
                    .error(format!(
                        "Failed to create output directory {}: {}",
                        self.output_dir.display(),
                        e
                    ))
                    .await?;
                return Err(e.into());
            }
        }

        let mailbox = records.mailbox.as_str();

        self.export_one(records.move_request.as_ref(), Some(mailbox), audit, outcome)
            .await?;
        self.export_one(
            records.move_request_statistics.as_ref(),
            Some(mailbox),
            audit,
            outcome,
        )
        .await?;
        self.export_one(records.migration_user.as_ref(), Some(mailbox), audit, outcome)
            .await?;
        self.export_one(
            records.migration_user_statistics.as_ref(),
            Some(mailbox),
            audit,
            outcome,
        )
        .await?;
        self.export_one(records.migration_batch.as_ref(), Some(mailbox), audit, outcome)
            .await?;

        // Named after the endpoint itself, not the mailbox
        match &records.migration_endpoint {
            Some(endpoint) => match endpoint.identity() {
                Some(identity) => {
                    self.export_one(Some(endpoint), Some(identity.as_str()), audit, outcome)
                        .await?;
                }
                None => {
                    audit
                        .warn(format!(
                            "{} for {} has no identity; not exported",
                            RecordKind::MigrationEndpoint,
                            mailbox
                        ))
                        .await?;
                    outcome.skipped.push(RecordKind::MigrationEndpoint);
                }
            },
            None => self.skip(RecordKind::MigrationEndpoint, mailbox, outcome),
        }

        if self.config_exported {
            debug!("{} already exported this run", RecordKind::MigrationConfig);
        } else if records.migration_config.is_some() {
            self.export_one(records.migration_config.as_ref(), None, audit, outcome)
                .await?;
            self.config_exported = true;
        } else {
            self.skip(RecordKind::MigrationConfig, "tenant", outcome);
        }
        self.export_one(records.mailbox_statistics.as_ref(), Some(mailbox), audit, outcome)
            .await?;
        self.export_one(records.move_history.as_ref(), Some(mailbox), audit, outcome)
            .await?;

        Ok(())
    }

    async fn export_one<R: Record>(
        &self,
        record: Option<&R>,
        identity: Option<&str>,
        audit: &AuditLog,
        outcome: &mut ExportOutcome,
    ) -> Result<()> {
        let Some(record) = record else {
            self.skip(R::KIND, identity.unwrap_or("tenant"), outcome);
            return Ok(());
        };

        let path = self.output_dir.join(R::KIND.file_name(identity));
        match write_record(&path, record).await {
            Ok(()) => {
                debug!("Exported {} to {}", R::KIND, path.display());
                outcome.written.push(path);
                Ok(())
            }
            Err(e) => {
                audit
                    .error(format!("Failed to export {} to {}: {}", R::KIND, path.display(), e))
                    .await?;
                Err(e)
            }
        }
    }

    fn skip(&self, kind: RecordKind, identity: &str, outcome: &mut ExportOutcome) {
        debug!("{} absent for {}, nothing exported", kind, identity);
        outcome.skipped.push(kind);
    }
}

async fn write_record<R: Record>(path: &Path, record: &R) -> Result<()> {
    let mut contents = serde_json::to_vec_pretty(record)?;
    contents.push(b'\n');
    write_file(path, &contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::read_entries;
    use crate::error::ReportError;
    use crate::records::{MailboxIdentity, MigrationConfig, MigrationEndpoint, MoveRequest};
    use serde_json::json;
    use tempfile::TempDir;

    fn mailbox() -> MailboxIdentity {
        MailboxIdentity::new("alice@contoso.com").unwrap()
    }

    #[tokio::test]
    async fn test_export_only_present_records() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path().join("out"));

        let mut records = MailboxRecords::empty(mailbox());
        records.move_request = Some(MoveRequest::from_value(json!({"Status": "Queued"})).unwrap());

        let mut outcome = ExportOutcome::default();
        exporter.export(&records, &audit, &mut outcome).await.unwrap();

        assert_eq!(
            outcome.written,
            vec![dir.path().join("out").join("MoveRequest_alice@contoso.com.json")]
        );
        assert_eq!(outcome.skipped.len(), 8);
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);

        let reloaded: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&outcome.written[0]).unwrap()).unwrap();
        assert_eq!(reloaded, json!({"Status": "Queued"}));
    }

    #[tokio::test]
    async fn test_endpoint_named_after_endpoint_identity() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path());

        let mut records = MailboxRecords::empty(mailbox());
        records.migration_endpoint =
            Some(MigrationEndpoint::from_value(json!({"Identity": "HybridEP01"})).unwrap());

        let mut outcome = ExportOutcome::default();
        exporter.export(&records, &audit, &mut outcome).await.unwrap();

        assert_eq!(outcome.written, vec![dir.path().join("MigrationEndpoint_HybridEP01.json")]);
        assert!(!dir.path().join("MigrationEndpoint_alice@contoso.com.json").exists());
    }

    #[tokio::test]
    async fn test_endpoint_without_identity_not_exported() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path());

        let mut records = MailboxRecords::empty(mailbox());
        records.migration_endpoint =
            Some(MigrationEndpoint::from_value(json!({"Identity": ""})).unwrap());

        let mut outcome = ExportOutcome::default();
        exporter.export(&records, &audit, &mut outcome).await.unwrap();

        assert!(outcome.written.is_empty());
        assert!(!dir.path().join("MigrationEndpoint_.json").exists());
        assert_eq!(audit.counts().warn, 1);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_and_is_audited() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path());
        std::fs::create_dir(dir.path().join("MoveRequest_alice@contoso.com.json")).unwrap();

        let mut records = MailboxRecords::empty(mailbox());
        records.move_request = Some(MoveRequest::default());
        records.migration_user = Some(Default::default());

        let mut outcome = ExportOutcome::default();
        let result = exporter.export(&records, &audit, &mut outcome).await;

        assert!(matches!(result, Err(ReportError::Io(_))));
        assert!(outcome.written.is_empty());
        assert!(!dir.path().join("MigrationUser_alice@contoso.com.json").exists());

        let entries = read_entries(audit.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.starts_with("Failed to export MoveRequest"));
    }

    #[tokio::test]
    async fn test_failed_export_keeps_files_already_written() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path());
        std::fs::create_dir(dir.path().join("MoveRequestStatistics_alice@contoso.com.json"))
            .unwrap();

        let mut records = MailboxRecords::empty(mailbox());
        records.move_request = Some(MoveRequest::default());
        records.move_request_statistics = Some(Default::default());

        let mut outcome = ExportOutcome::default();
        let result = exporter.export(&records, &audit, &mut outcome).await;

        assert!(result.is_err());
        assert_eq!(
            outcome.written,
            vec![dir.path().join("MoveRequest_alice@contoso.com.json")]
        );
    }

    #[tokio::test]
    async fn test_config_written_once_per_run() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let mut exporter = Exporter::new(dir.path());
        let config_path = dir.path().join("MigrationConfig.json");

        let mut first = MailboxRecords::empty(mailbox());
        first.migration_config =
            Some(MigrationConfig::from_value(json!({"MaxNumberOfBatches": 100})).unwrap());
        let mut second = MailboxRecords::empty(MailboxIdentity::new("bob@contoso.com").unwrap());
        second.migration_config = first.migration_config.clone();

        let mut outcome = ExportOutcome::default();
        exporter.export(&first, &audit, &mut outcome).await.unwrap();
        assert_eq!(outcome.written, vec![config_path.clone()]);

        let mut outcome = ExportOutcome::default();
        exporter.export(&second, &audit, &mut outcome).await.unwrap();
        assert!(outcome.written.is_empty());

        exporter.begin_run();
        let mut outcome = ExportOutcome::default();
        exporter.export(&second, &audit, &mut outcome).await.unwrap();
        assert_eq!(outcome.written, vec![config_path]);
    }
}
