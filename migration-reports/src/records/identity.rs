//! Mailbox identity and file-name handling

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Characters that cannot appear in an export file name
const UNSAFE_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// UPN or alias naming the mailbox under diagnosis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MailboxIdentity(String);

impl MailboxIdentity {
    /// Create an identity, rejecting blank input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ReportError::InvalidIdentity(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form used inside export file names
    pub fn file_component(&self) -> String {
        file_component(&self.0)
    }
}

impl std::fmt::Display for MailboxIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MailboxIdentity {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MailboxIdentity> for String {
    fn from(identity: MailboxIdentity) -> Self {
        identity.0
    }
}

impl std::str::FromStr for MailboxIdentity {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Escape characters that would escape the output directory or are
/// illegal in Windows file names
///
/// Each such character, and `%` itself, becomes `%XX` per UTF-8 byte, so
/// distinct identities always map to distinct file names.
pub fn file_component(value: &str) -> String {
    let mut component = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '%' || UNSAFE_FILE_CHARS.contains(&c) || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                component.push_str(&format!("%{:02X}", byte));
            }
        } else {
            component.push(c);
        }
    }
    component
}
