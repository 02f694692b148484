//! Run orchestration
//!
//! Mailboxes are processed one at a time in the order given. A failure
//! while processing one mailbox is audited and recorded in its outcome;
//! the run always moves on to the next mailbox.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

use super::collector::Collector;
use super::exporter::{ExportOutcome, Exporter};
use super::summary::write_summary;
use crate::audit::{AuditCounts, AuditLog};
use crate::config::Config;
use crate::error::Result;
use crate::records::MailboxIdentity;
use crate::service::MigrationService;

/// Result of one mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Succeeded => write!(f, "Succeeded"),
            OutcomeStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MailboxOutcome {
    pub mailbox: MailboxIdentity,
    pub status: OutcomeStatus,
    /// Error that aborted the mailbox
    pub error: Option<String>,
    /// Files written before completion or failure
    pub files: Vec<PathBuf>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<MailboxOutcome>,
    pub counts: AuditCounts,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.status == OutcomeStatus::Failed)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct ReportRunner {
    collector: Collector,
    exporter: Exporter,
    audit: AuditLog,
    output_dir: PathBuf,
}

impl ReportRunner {
    /// Prepare the output directory and open the audit log
    pub async fn new(service: Arc<dyn MigrationService>, config: &Config) -> Result<Self> {
        let output_dir = config.output.directory.clone();
        if !output_dir.exists() {
            fs::create_dir_all(&output_dir).await?;
        }

        let audit = AuditLog::open(config.log_path()).await?;

        Ok(Self {
            collector: Collector::new(service, config.collector.cache_migration_config),
            exporter: Exporter::new(output_dir.clone()),
            audit,
            output_dir,
        })
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Summary file for `mailbox`
    pub fn summary_path(&self, mailbox: &MailboxIdentity) -> PathBuf {
        self.output_dir
            .join(format!("MigrationSummary_{}.txt", mailbox.file_component()))
    }

    /// Process every mailbox in order
    pub async fn run(&mut self, mailboxes: &[MailboxIdentity]) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.exporter.begin_run();
        self.audit
            .info(format!(
                "Run {} started: {} mailbox(es), backend {}, output {}",
                run_id,
                mailboxes.len(),
                self.collector.service_name(),
                self.output_dir.display()
            ))
            .await?;

        let mut outcomes = Vec::with_capacity(mailboxes.len());
        for mailbox in mailboxes {
            self.audit.info(format!("Processing {}", mailbox)).await?;

            let mut files = Vec::new();
            let outcome = match self.process(mailbox, &mut files).await {
                Ok(()) => {
                    self.audit
                        .info(format!("{} processed: {} file(s) written", mailbox, files.len()))
                        .await?;
                    MailboxOutcome {
                        mailbox: mailbox.clone(),
                        status: OutcomeStatus::Succeeded,
                        error: None,
                        files,
                    }
                }
                Err(e) => {
                    self.audit
                        .error(format!("{} failed: {}", mailbox, e))
                        .await?;
                    MailboxOutcome {
                        mailbox: mailbox.clone(),
                        status: OutcomeStatus::Failed,
                        error: Some(e.to_string()),
                        files,
                    }
                }
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Succeeded)
            .count();
        let failed = outcomes.len() - succeeded;
        let closing = format!(
            "Run {} finished: {} succeeded, {} failed ({})",
            run_id,
            succeeded,
            failed,
            self.audit.counts()
        );
        if failed > 0 {
            self.audit.error(closing).await?;
        } else {
            self.audit.info(closing).await?;
        }

        Ok(RunReport {
            run_id,
            outcomes,
            counts: self.audit.counts(),
        })
    }

    async fn process(&mut self, mailbox: &MailboxIdentity, files: &mut Vec<PathBuf>) -> Result<()> {
        let records = self.collector.collect(mailbox, &self.audit).await?;

        let mut exported = ExportOutcome::default();
        let result = self.exporter.export(&records, &self.audit, &mut exported).await;
        files.extend(exported.written);
        result?;

        let summary_path = self.summary_path(mailbox);
        if let Some(path) = write_summary(
            mailbox,
            records.move_request_statistics.as_ref(),
            &summary_path,
            &self.audit,
        )
        .await?
        {
            files.push(path);
        }

        Ok(())
    }
}
