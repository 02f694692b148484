//! Error types for migration-reports

use thiserror::Error;

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Report error types
///
/// Data absence is never an error here: a record the service cannot find
/// is an `Ok(None)`. These variants cover the failures that abort the
/// current mailbox.
#[derive(Error, Debug)]
pub enum ReportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The administrative service signalled an error
    #[error("Service error: {0}")]
    Service(String),

    /// Failure summary could not be generated
    #[error("Summary error: {0}")]
    Summary(String),

    /// Mailbox identity rejected
    #[error("Invalid mailbox identity: {0:?}")]
    InvalidIdentity(String),
}
