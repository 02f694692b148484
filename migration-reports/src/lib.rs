//! migration-reports: Exchange mailbox-migration diagnostics collector
//!
//! For each requested mailbox, queries the migration diagnostics an
//! Exchange administrator usually gathers by hand, writes every record the
//! service returns to its own JSON file and derives a plain-text failure
//! summary from the move statistics.
//!
//! # Features
//!
//! - **Fail-soft collection**: a record the service cannot return is logged
//!   and skipped; the other records are still collected and exported
//! - **Fail-fast export**: a write failure aborts the current mailbox only
//! - **Deduplicated failures**: failures grouped by type, with the last
//!   occurrence of each type shown in full
//! - **Audit trail**: one append-only log shared by every run that uses the
//!   same output directory
//!
//! # Example
//!
//! ```no_run
//! use migration_reports::config::Config;
//! use migration_reports::records::MailboxIdentity;
//! use migration_reports::report::ReportRunner;
//! use migration_reports::service::ExchangeShell;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let service = Arc::new(ExchangeShell::new(&config.service));
//!
//!     let mut runner = ReportRunner::new(service, &config).await?;
//!     let report = runner
//!         .run(&[MailboxIdentity::new("alice@contoso.com")?])
//!         .await?;
//!
//!     println!("{} succeeded, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`audit`]: Run-scoped audit log
//! - [`records`]: Diagnostic record types
//! - [`service`]: External service backends
//! - [`report`]: Collection, export and summary pipeline

pub mod audit;
pub mod config;
pub mod error;
pub mod records;
pub mod report;
pub mod service;

// Re-export commonly used types
pub use config::Config;
pub use error::{ReportError, Result};
