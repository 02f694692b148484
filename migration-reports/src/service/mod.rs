//! External administrative service abstraction
//!
//! Every query is read-only. `Ok(None)` means the service has no such
//! record; `Err(_)` means the service itself reported a failure. Callers
//! treat both as an absent record.

use crate::error::Result;
use crate::records::{
    MailboxIdentity, MailboxStatistics, MigrationBatch, MigrationConfig, MigrationEndpoint,
    MigrationUser, MigrationUserStatistics, MoveRequest, MoveRequestStatistics,
};

pub mod memory;
pub mod shell;
pub mod snapshot;

pub use memory::InMemoryService;
pub use shell::ExchangeShell;
pub use snapshot::SnapshotService;

/// Migration diagnostics service trait
#[async_trait::async_trait]
pub trait MigrationService: Send + Sync {
    async fn move_request(&self, mailbox: &MailboxIdentity) -> Result<Option<MoveRequest>>;

    /// Move statistics including the failure report
    async fn move_request_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MoveRequestStatistics>>;

    async fn migration_user(&self, mailbox: &MailboxIdentity) -> Result<Option<MigrationUser>>;

    async fn migration_user_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MigrationUserStatistics>>;

    async fn migration_batch(&self, batch_name: &str) -> Result<Option<MigrationBatch>>;

    async fn migration_endpoint(&self, endpoint: &str) -> Result<Option<MigrationEndpoint>>;

    /// Tenant-wide settings
    async fn migration_config(&self) -> Result<Option<MigrationConfig>>;

    /// Mailbox statistics including the move history
    async fn mailbox_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MailboxStatistics>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
