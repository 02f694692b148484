//! Record collection
//!
//! Issues the diagnostic queries for one mailbox in a fixed order. Nothing
//! the service fails to return is fatal: each absent record produces one
//! audit entry (WARN, or ERROR for the move request) and collection moves
//! on. Only a failure to write the audit log aborts.

use std::sync::Arc;

use crate::audit::{AuditLevel, AuditLog};
use crate::error::Result;
use crate::records::{MailboxIdentity, MailboxRecords, MigrationConfig, Record, RecordKind};
use crate::service::MigrationService;

/// Prefix the service puts on batch names in move statistics
const BATCH_NAME_PREFIX: &str = "MigrationService:";

pub struct Collector {
    service: Arc<dyn MigrationService>,
    cache_config: bool,
    cached_config: Option<Option<MigrationConfig>>,
}

impl Collector {
    pub fn new(service: Arc<dyn MigrationService>, cache_config: bool) -> Self {
        Self {
            service,
            cache_config,
            cached_config: None,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Gather every record for `mailbox`
    pub async fn collect(
        &mut self,
        mailbox: &MailboxIdentity,
        audit: &AuditLog,
    ) -> Result<MailboxRecords> {
        let mut records = MailboxRecords::empty(mailbox.clone());

        let outcome = self.service.move_request(mailbox).await;
        records.move_request = settle(audit, mailbox, outcome).await?;

        let outcome = self.service.move_request_statistics(mailbox).await;
        records.move_request_statistics = settle(audit, mailbox, outcome).await?;

        let outcome = self.service.migration_user(mailbox).await;
        records.migration_user = settle(audit, mailbox, outcome).await?;

        let outcome = self.service.migration_user_statistics(mailbox).await;
        records.migration_user_statistics = settle(audit, mailbox, outcome).await?;

        let batch_name = records
            .move_request_statistics
            .as_ref()
            .and_then(|stats| stats.batch_name())
            .map(|name| batch_query_name(&name))
            .filter(|name| !name.is_empty());
        records.migration_batch = match batch_name {
            Some(name) => {
                let outcome = self.service.migration_batch(&name).await;
                settle(audit, mailbox, outcome).await?
            }
            None => {
                skipped(audit, RecordKind::MigrationBatch, mailbox, "no batch name available")
                    .await?;
                None
            }
        };

        let endpoint = records
            .migration_batch
            .as_ref()
            .and_then(|batch| batch.endpoint_identity());
        records.migration_endpoint = match endpoint {
            Some(endpoint) => {
                let outcome = self.service.migration_endpoint(&endpoint).await;
                settle(audit, mailbox, outcome).await?
            }
            None => {
                skipped(audit, RecordKind::MigrationEndpoint, mailbox, "no endpoint available")
                    .await?;
                None
            }
        };

        records.migration_config = self.migration_config(mailbox, audit).await?;

        let outcome = self.service.mailbox_statistics(mailbox).await;
        records.mailbox_statistics = settle(audit, mailbox, outcome).await?;

        records.move_history = match &records.mailbox_statistics {
            Some(stats) => match stats.latest_move() {
                Some(entry) => {
                    audit
                        .info(format!("{} collected for {}", RecordKind::MoveHistoryEntry, mailbox))
                        .await?;
                    Some(entry)
                }
                None => {
                    audit
                        .warn(format!(
                            "{} not found for {}: move history is empty",
                            RecordKind::MoveHistoryEntry,
                            mailbox
                        ))
                        .await?;
                    None
                }
            },
            None => {
                skipped(
                    audit,
                    RecordKind::MoveHistoryEntry,
                    mailbox,
                    "no mailbox statistics available",
                )
                .await?;
                None
            }
        };

        Ok(records)
    }

    async fn migration_config(
        &mut self,
        mailbox: &MailboxIdentity,
        audit: &AuditLog,
    ) -> Result<Option<MigrationConfig>> {
        if let Some(cached) = &self.cached_config {
            return match cached {
                Some(config) => {
                    audit
                        .info(format!(
                            "{} reused from earlier lookup for {}",
                            RecordKind::MigrationConfig,
                            mailbox
                        ))
                        .await?;
                    Ok(Some(config.clone()))
                }
                None => {
                    audit
                        .warn(format!(
                            "{} not found for {} (cached)",
                            RecordKind::MigrationConfig,
                            mailbox
                        ))
                        .await?;
                    Ok(None)
                }
            };
        }

        let outcome = self.service.migration_config().await;
        let lookup_failed = outcome.is_err();
        let config = settle(audit, mailbox, outcome).await?;

        // Service errors are retried on the next mailbox
        if self.cache_config && !lookup_failed {
            self.cached_config = Some(config.clone());
        }

        Ok(config)
    }
}

/// Strip the service prefix from a batch name
pub fn batch_query_name(raw: &str) -> String {
    raw.trim()
        .strip_prefix(BATCH_NAME_PREFIX)
        .unwrap_or(raw.trim())
        .trim()
        .to_string()
}

fn absence_level(kind: RecordKind) -> AuditLevel {
    match kind {
        RecordKind::MoveRequest => AuditLevel::Error,
        _ => AuditLevel::Warn,
    }
}

/// Turn a query outcome into an optional record, auditing the result
async fn settle<R: Record>(
    audit: &AuditLog,
    mailbox: &MailboxIdentity,
    outcome: Result<Option<R>>,
) -> Result<Option<R>> {
    match outcome {
        Ok(Some(record)) => {
            audit
                .info(format!("{} collected for {}", R::KIND, mailbox))
                .await?;
            Ok(Some(record))
        }
        Ok(None) => {
            let message = match R::KIND {
                RecordKind::MoveRequest => format!(
                    "{} not found for {}: mailbox has no move to diagnose",
                    R::KIND,
                    mailbox
                ),
                kind => format!("{} not found for {}", kind, mailbox),
            };
            audit.record(absence_level(R::KIND), &message).await?;
            Ok(None)
        }
        Err(e) => {
            audit
                .record(
                    absence_level(R::KIND),
                    &format!("{} lookup failed for {}: {}", R::KIND, mailbox, e),
                )
                .await?;
            Ok(None)
        }
    }
}

async fn skipped(
    audit: &AuditLog,
    kind: RecordKind,
    mailbox: &MailboxIdentity,
    reason: &str,
) -> Result<()> {
    audit
        .record(
            absence_level(kind),
            &format!("{} not found for {}: {}", kind, mailbox, reason),
        )
        .await
}
