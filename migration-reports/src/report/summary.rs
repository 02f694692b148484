//! Plain-text failure summary
//!
//! Failures are grouped by type with a count per group. The detailed
//! section shows, for each distinct type, the last entry of that type in
//! the order the service reported them. That is a positional rule, not a
//! timestamp comparison.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::write_file;
use crate::audit::AuditLog;
use crate::error::Result;
use crate::records::{FailureEntry, MailboxIdentity, MoveRequestStatistics};

const SEPARATOR_WIDTH: usize = 60;

/// Number of failures of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureGroup {
    pub failure_type: String,
    pub count: usize,
}

/// Failures grouped by type, derived fresh for each mailbox
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Groups in order of first appearance
    pub groups: Vec<FailureGroup>,
    /// Last entry of each type, in group order
    pub latest: Vec<FailureEntry>,
}

impl FailureSummary {
    pub fn from_failures(failures: &[FailureEntry]) -> Self {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<FailureGroup> = Vec::new();
        let mut last_seen: Vec<usize> = Vec::new();

        for (index, failure) in failures.iter().enumerate() {
            match positions.get(failure.failure_type.as_str()) {
                Some(&group) => {
                    groups[group].count += 1;
                    last_seen[group] = index;
                }
                None => {
                    positions.insert(failure.failure_type.as_str(), groups.len());
                    groups.push(FailureGroup {
                        failure_type: failure.failure_type.clone(),
                        count: 1,
                    });
                    last_seen.push(index);
                }
            }
        }

        let latest = last_seen.iter().map(|&index| failures[index].clone()).collect();
        Self { groups, latest }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(|group| group.count).sum()
    }
}

/// Render the summary text for one mailbox
pub fn render(mailbox: &MailboxIdentity, stats: &MoveRequestStatistics) -> Result<String> {
    let summary = FailureSummary::from_failures(&stats.failures()?);
    let separator = "=".repeat(SEPARATOR_WIDTH);

    let mut report = String::new();
    report.push_str(&format!("Migration Report for {}\n", mailbox));
    report.push_str(&separator);
    report.push('\n');
    report.push_str(&format!(
        "Status     : {}\n",
        stats.status().unwrap_or_else(|| "Unknown".to_string())
    ));
    report.push_str(&format!(
        "% Complete : {}\n",
        stats.percent_complete().unwrap_or_else(|| "n/a".to_string())
    ));
    report.push('\n');
    report.push_str(&stats.message().unwrap_or_default());
    report.push('\n');

    report.push_str(&separator);
    report.push('\n');
    report.push_str("Failure Summary\n");
    if !summary.is_empty() {
        let width = summary
            .groups
            .iter()
            .map(|group| group.count.to_string().len())
            .max()
            .unwrap_or(0)
            .max("Count".len());

        report.push('\n');
        report.push_str(&format!("{:>width$} FailureType\n", "Count", width = width));
        report.push_str(&format!("{:>width$} -----------\n", "-----", width = width));
        for group in &summary.groups {
            report.push_str(&format!(
                "{:>width$} {}\n",
                group.count,
                group.failure_type,
                width = width
            ));
        }
    }

    report.push_str(&separator);
    report.push('\n');
    report.push_str("Detailed Failures\n");
    for failure in &summary.latest {
        report.push('\n');
        report.push_str(&format!(
            "Timestamp   : {}\n",
            failure.timestamp.as_deref().unwrap_or_default()
        ));
        report.push_str(&format!("FailureType : {}\n", failure.failure_type));
        report.push_str(&format!(
            "FailureSide : {}\n",
            failure.failure_side.as_deref().unwrap_or_default()
        ));
        report.push_str(&format!(
            "Message     : {}\n",
            failure.message.as_deref().unwrap_or_default()
        ));
    }

    Ok(report)
}

/// Generate the summary file for one mailbox at `path`
///
/// Returns `Ok(None)` without writing anything when the move statistics
/// are absent.
pub async fn write_summary(
    mailbox: &MailboxIdentity,
    stats: Option<&MoveRequestStatistics>,
    path: &Path,
    audit: &AuditLog,
) -> Result<Option<PathBuf>> {
    let Some(stats) = stats else {
        audit
            .warn(format!(
                "No MoveRequestStatistics for {}; failure summary not generated",
                mailbox
            ))
            .await?;
        return Ok(None);
    };

    let text = match render(mailbox, stats) {
        Ok(text) => text,
        Err(e) => {
            audit
                .error(format!("Failed to build failure summary for {}: {}", mailbox, e))
                .await?;
            return Err(e);
        }
    };

    if let Err(e) = write_file(path, text.as_bytes()).await {
        audit
            .error(format!(
                "Failed to write failure summary {}: {}",
                path.display(),
                e
            ))
            .await?;
        return Err(e.into());
    }

    audit
        .info(format!("Failure summary for {} written to {}", mailbox, path.display()))
        .await?;
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::records::Record;
    use serde_json::json;
    use tempfile::TempDir;

    fn mailbox() -> MailboxIdentity {
        MailboxIdentity::new("alice@contoso.com").unwrap()
    }

    fn failure(failure_type: &str, ts: &str) -> FailureEntry {
        FailureEntry::new(failure_type)
            .with_timestamp(ts)
            .with_side("Source")
            .with_message(format!("{} at {}", failure_type, ts))
    }

    #[test]
    fn test_groups_and_last_occurrence() {
        let failures = vec![failure("A", "1"), failure("B", "2"), failure("A", "3")];
        let summary = FailureSummary::from_failures(&failures);

        assert_eq!(
            summary.groups,
            vec![
                FailureGroup {
                    failure_type: "A".to_string(),
                    count: 2
                },
                FailureGroup {
                    failure_type: "B".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(summary.latest.len(), 2);
        assert_eq!(summary.latest[0].timestamp.as_deref(), Some("3"));
        assert_eq!(summary.latest[1].timestamp.as_deref(), Some("2"));
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_last_occurrence_is_positional() {
        // Out of chronological order: the later position wins regardless
        let failures = vec![failure("A", "2026-05-02"), failure("A", "2026-05-01")];
        let summary = FailureSummary::from_failures(&failures);

        assert_eq!(summary.latest[0].timestamp.as_deref(), Some("2026-05-01"));
    }

    #[test]
    fn test_render_layout() {
        let stats = MoveRequestStatistics::from_value(json!({
            "Status": "InProgress",
            "PercentComplete": 42,
            "Message": "Copying mailbox content",
            "Report": {"Failures": [
                {"Timestamp": "1", "FailureType": "A", "FailureSide": "Source", "Message": "a1"},
                {"Timestamp": "2", "FailureType": "B", "FailureSide": "Target", "Message": "b2"},
                {"Timestamp": "3", "FailureType": "A", "FailureSide": "Source", "Message": "a3"}
            ]}
        }))
        .unwrap();

        let text = render(&mailbox(), &stats).unwrap();
        let separator = "=".repeat(60);
        let expected = format!(
            "Migration Report for alice@contoso.com\n\
             {sep}\n\
             Status     : InProgress\n\
             % Complete : 42\n\
             \n\
             Copying mailbox content\n\
             {sep}\n\
             Failure Summary\n\
             \n\
             Count FailureType\n\
             ----- -----------\n\
             \x20   2 A\n\
             \x20   1 B\n\
             {sep}\n\
             Detailed Failures\n\
             \n\
             Timestamp   : 3\n\
             FailureType : A\n\
             FailureSide : Source\n\
             Message     : a3\n\
             \n\
             Timestamp   : 2\n\
             FailureType : B\n\
             FailureSide : Target\n\
             Message     : b2\n",
            sep = separator
        );

        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_without_failures() {
        let stats = MoveRequestStatistics::from_value(json!({
            "Status": "Completed",
            "PercentComplete": 100,
            "Report": {"Failures": []}
        }))
        .unwrap();

        let text = render(&mailbox(), &stats).unwrap();

        assert!(text.contains("Status     : Completed\n"));
        assert!(text.contains("% Complete : 100\n"));
        assert!(text.contains(&format!("Failure Summary\n{}\n", "=".repeat(60))));
        assert!(text.ends_with("Detailed Failures\n"));
        assert!(!text.contains("FailureType :"));
    }

    #[test]
    fn test_render_missing_status_fields() {
        let stats = MoveRequestStatistics::default();
        let text = render(&mailbox(), &stats).unwrap();

        assert!(text.contains("Status     : Unknown\n"));
        assert!(text.contains("% Complete : n/a\n"));
    }

    #[test]
    fn test_render_malformed_failure() {
        let stats = MoveRequestStatistics::from_value(json!({
            "Report": {"Failures": [{"Message": "missing type"}]}
        }))
        .unwrap();

        assert!(matches!(
            render(&mailbox(), &stats),
            Err(ReportError::Summary(_))
        ));
    }

    #[tokio::test]
    async fn test_write_summary_skips_when_absent() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let path = dir.path().join("MigrationSummary_alice@contoso.com.txt");

        let written = write_summary(&mailbox(), None, &path, &audit).await.unwrap();

        assert!(written.is_none());
        assert!(!path.exists());
        assert_eq!(audit.counts().warn, 1);
    }

    #[tokio::test]
    async fn test_write_summary_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let path = dir.path().join("summary.txt");
        let stats = MoveRequestStatistics::from_value(json!({
            "Report": {"Failures": [42]}
        }))
        .unwrap();

        let result = write_summary(&mailbox(), Some(&stats), &path, &audit).await;

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(audit.counts().error, 1);
    }

    #[tokio::test]
    async fn test_write_summary_targets_given_path() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path().join("audit.log")).await.unwrap();
        let stats = MoveRequestStatistics::from_value(json!({"Status": "Queued"})).unwrap();

        let first = dir.path().join("MigrationSummary_a@contoso.com.txt");
        let second = dir.path().join("MigrationSummary_b@contoso.com.txt");
        let a = MailboxIdentity::new("a@contoso.com").unwrap();
        let b = MailboxIdentity::new("b@contoso.com").unwrap();

        write_summary(&a, Some(&stats), &first, &audit).await.unwrap();
        write_summary(&b, Some(&stats), &second, &audit).await.unwrap();

        assert!(std::fs::read_to_string(&first).unwrap().contains("a@contoso.com"));
        assert!(std::fs::read_to_string(&second).unwrap().contains("b@contoso.com"));
    }
}
