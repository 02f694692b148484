//! Diagnostic records collected per mailbox

pub mod identity;
pub mod types;

pub use identity::{file_component, MailboxIdentity};
pub use types::*;
