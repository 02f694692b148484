//! Diagnostic record types
//!
//! Records are kept as the property bags the management shell emits, so a
//! record written to disk carries every property the service returned. The
//! accessors below read the handful of properties the collector and the
//! summary generator depend on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identity::{file_component, MailboxIdentity};
use crate::error::{ReportError, Result};

/// Raw record properties, keyed by the service's PascalCase names
pub type Properties = Map<String, Value>;

/// The nine diagnostic record kinds collected per mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    MoveRequest,
    MoveRequestStatistics,
    MigrationUser,
    MigrationUserStatistics,
    MigrationBatch,
    MigrationEndpoint,
    MigrationConfig,
    MailboxStatistics,
    MoveHistoryEntry,
}

impl RecordKind {
    /// All kinds, in collection order
    pub const ALL: [RecordKind; 9] = [
        RecordKind::MoveRequest,
        RecordKind::MoveRequestStatistics,
        RecordKind::MigrationUser,
        RecordKind::MigrationUserStatistics,
        RecordKind::MigrationBatch,
        RecordKind::MigrationEndpoint,
        RecordKind::MigrationConfig,
        RecordKind::MailboxStatistics,
        RecordKind::MoveHistoryEntry,
    ];

    /// Stem used for export and snapshot file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            RecordKind::MoveHistoryEntry => "MoveHistory",
            other => other.name(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::MoveRequest => "MoveRequest",
            RecordKind::MoveRequestStatistics => "MoveRequestStatistics",
            RecordKind::MigrationUser => "MigrationUser",
            RecordKind::MigrationUserStatistics => "MigrationUserStatistics",
            RecordKind::MigrationBatch => "MigrationBatch",
            RecordKind::MigrationEndpoint => "MigrationEndpoint",
            RecordKind::MigrationConfig => "MigrationConfig",
            RecordKind::MailboxStatistics => "MailboxStatistics",
            RecordKind::MoveHistoryEntry => "MoveHistoryEntry",
        }
    }

    /// Tenant-wide records are not tied to a mailbox
    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, RecordKind::MigrationConfig)
    }

    /// `<Kind>_<identity>.json`, or `<Kind>.json` without an identity
    pub fn file_name(&self, identity: Option<&str>) -> String {
        match identity {
            Some(identity) => format!("{}_{}.json", self.file_stem(), file_component(identity)),
            None => format!("{}.json", self.file_stem()),
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Common behaviour of every diagnostic record
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: RecordKind;

    fn properties(&self) -> &Properties;

    fn property(&self, name: &str) -> Option<&Value> {
        self.properties().get(name)
    }

    /// Build a record from a JSON object
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(ReportError::Service(format!(
                "{} is not an object: {}",
                Self::KIND,
                type_name(&other)
            ))),
        }
    }
}

macro_rules! define_record {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name {
            pub properties: Properties,
        }

        impl $name {
            pub fn new(properties: Properties) -> Self {
                Self { properties }
            }
        }

        impl Record for $name {
            const KIND: RecordKind = RecordKind::$name;

            fn properties(&self) -> &Properties {
                &self.properties
            }
        }
    };
}

define_record!(
    /// Administrative object for one mailbox move
    MoveRequest
);
define_record!(
    /// Move progress, status and the embedded failure report
    MoveRequestStatistics
);
define_record!(
    /// Mailbox membership in a migration batch
    MigrationUser
);
define_record!(MigrationUserStatistics);
define_record!(
    /// Named group of move requests
    MigrationBatch
);
define_record!(
    /// Connection settings for the remote side of a migration
    MigrationEndpoint
);
define_record!(
    /// Tenant-wide migration settings
    MigrationConfig
);
define_record!(
    /// Mailbox statistics including the embedded move history
    MailboxStatistics
);
define_record!(
    /// One completed or failed move taken from the move history
    MoveHistoryEntry
);

impl MoveRequestStatistics {
    pub fn status(&self) -> Option<String> {
        self.property("Status").and_then(text_of)
    }

    pub fn percent_complete(&self) -> Option<String> {
        self.property("PercentComplete").and_then(text_of)
    }

    /// Free-text status message
    pub fn message(&self) -> Option<String> {
        self.property("Message").and_then(text_of)
    }

    pub fn batch_name(&self) -> Option<String> {
        self.property("BatchName").and_then(text_of)
    }

    /// Failures from the embedded report, in the order the service listed them
    pub fn failures(&self) -> Result<Vec<FailureEntry>> {
        let report = match self.property("Report") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Object(report)) => report,
            Some(other) => {
                return Err(ReportError::Summary(format!(
                    "Report is a {}, not an object (raise service.json_depth)",
                    type_name(other)
                )))
            }
        };

        match report.get("Failures") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| FailureEntry::from_value(index, item))
                .collect(),
            Some(single @ Value::Object(_)) => Ok(vec![FailureEntry::from_value(0, single)?]),
            Some(other) => Err(ReportError::Summary(format!(
                "Report.Failures is a {}, not a list",
                type_name(other)
            ))),
        }
    }
}

impl MigrationBatch {
    pub fn name(&self) -> Option<String> {
        self.property("Identity")
            .and_then(text_of)
            .or_else(|| self.property("Name").and_then(text_of))
    }

    /// Endpoint on the remote side of the batch
    ///
    /// Onboarding batches name it as the source, offboarding batches as
    /// the target.
    pub fn endpoint_identity(&self) -> Option<String> {
        self.property("SourceEndpoint")
            .and_then(text_of)
            .or_else(|| self.property("TargetEndpoint").and_then(text_of))
    }
}

impl MigrationEndpoint {
    /// The endpoint's own identity
    pub fn identity(&self) -> Option<String> {
        self.property("Identity").and_then(text_of)
    }
}

impl MailboxStatistics {
    /// Most recent entry of the embedded move history
    pub fn latest_move(&self) -> Option<MoveHistoryEntry> {
        let first = match self.property("MoveHistory")? {
            Value::Array(entries) => entries.first()?,
            entry @ Value::Object(_) => entry,
            _ => return None,
        };

        match first {
            Value::Object(properties) => Some(MoveHistoryEntry::new(properties.clone())),
            _ => None,
        }
    }
}

/// One failure event from a move report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub timestamp: Option<String>,
    pub failure_type: String,
    pub failure_side: Option<String>,
    pub message: Option<String>,
}

impl FailureEntry {
    pub fn new(failure_type: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            failure_type: failure_type.into(),
            failure_side: None,
            message: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_side(mut self, side: impl Into<String>) -> Self {
        self.failure_side = Some(side.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn from_value(index: usize, value: &Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(ReportError::Summary(format!(
                "Failure #{} is a {}, not an object",
                index + 1,
                type_name(value)
            )));
        };

        let failure_type = fields
            .get("FailureType")
            .and_then(text_of)
            .ok_or_else(|| {
                ReportError::Summary(format!("Failure #{} has no FailureType", index + 1))
            })?;

        Ok(Self {
            timestamp: fields.get("Timestamp").and_then(text_of),
            failure_type,
            failure_side: fields.get("FailureSide").and_then(text_of),
            message: fields.get("Message").and_then(text_of),
        })
    }
}

/// Everything collected for one mailbox
///
/// Each record is independently optional; consumers must handle absence.
#[derive(Debug, Clone)]
pub struct MailboxRecords {
    pub mailbox: MailboxIdentity,
    pub move_request: Option<MoveRequest>,
    pub move_request_statistics: Option<MoveRequestStatistics>,
    pub migration_user: Option<MigrationUser>,
    pub migration_user_statistics: Option<MigrationUserStatistics>,
    pub migration_batch: Option<MigrationBatch>,
    pub migration_endpoint: Option<MigrationEndpoint>,
    pub migration_config: Option<MigrationConfig>,
    pub mailbox_statistics: Option<MailboxStatistics>,
    pub move_history: Option<MoveHistoryEntry>,
}

impl MailboxRecords {
    /// Record set with nothing collected yet
    pub fn empty(mailbox: MailboxIdentity) -> Self {
        Self {
            mailbox,
            move_request: None,
            move_request_statistics: None,
            migration_user: None,
            migration_user_statistics: None,
            migration_batch: None,
            migration_endpoint: None,
            migration_config: None,
            mailbox_statistics: None,
            move_history: None,
        }
    }

    pub fn is_present(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::MoveRequest => self.move_request.is_some(),
            RecordKind::MoveRequestStatistics => self.move_request_statistics.is_some(),
            RecordKind::MigrationUser => self.migration_user.is_some(),
            RecordKind::MigrationUserStatistics => self.migration_user_statistics.is_some(),
            RecordKind::MigrationBatch => self.migration_batch.is_some(),
            RecordKind::MigrationEndpoint => self.migration_endpoint.is_some(),
            RecordKind::MigrationConfig => self.migration_config.is_some(),
            RecordKind::MailboxStatistics => self.mailbox_statistics.is_some(),
            RecordKind::MoveHistoryEntry => self.move_history.is_some(),
        }
    }

    pub fn absent_kinds(&self) -> Vec<RecordKind> {
        RecordKind::ALL
            .into_iter()
            .filter(|kind| !self.is_present(*kind))
            .collect()
    }
}

/// Render a property value as display text
///
/// Identity-like objects are reduced to their name; blank strings and
/// nulls count as missing.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(fields) => ["Name", "Identity", "Id", "DisplayName"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(text_of))
            .or_else(|| Some(value.to_string())),
        Value::Array(_) => Some(value.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(value: Value) -> MoveRequestStatistics {
        MoveRequestStatistics::from_value(value).unwrap()
    }

    #[test]
    fn test_record_kind_file_stem() {
        assert_eq!(RecordKind::MoveHistoryEntry.file_stem(), "MoveHistory");
        assert_eq!(RecordKind::MigrationEndpoint.file_stem(), "MigrationEndpoint");
        assert!(RecordKind::MigrationConfig.is_tenant_scoped());
        assert!(!RecordKind::MoveRequest.is_tenant_scoped());
    }

    #[test]
    fn test_record_kind_file_name() {
        assert_eq!(
            RecordKind::MoveHistoryEntry.file_name(Some("alice@contoso.com")),
            "MoveHistory_alice@contoso.com.json"
        );
        assert_eq!(RecordKind::MigrationConfig.file_name(None), "MigrationConfig.json");
        assert_eq!(
            RecordKind::MigrationBatch.file_name(Some("Wave/1")),
            "MigrationBatch_Wave%2F1.json"
        );
    }

    #[test]
    fn test_status_and_percent_are_distinct_fields() {
        let record = stats(json!({
            "Status": "InProgress",
            "PercentComplete": 42,
            "Message": "Copying items"
        }));

        assert_eq!(record.status().as_deref(), Some("InProgress"));
        assert_eq!(record.percent_complete().as_deref(), Some("42"));
        assert_eq!(record.message().as_deref(), Some("Copying items"));
    }

    #[test]
    fn test_failures_in_source_order() {
        let record = stats(json!({
            "Report": {
                "Failures": [
                    {"Timestamp": "1", "FailureType": "A", "FailureSide": "Source", "Message": "first"},
                    {"Timestamp": "2", "FailureType": "B", "FailureSide": "Target", "Message": "second"}
                ]
            }
        }));

        let failures = record.failures().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].failure_type, "A");
        assert_eq!(failures[1].failure_side.as_deref(), Some("Target"));
    }

    #[test]
    fn test_missing_report_means_no_failures() {
        assert!(stats(json!({"Status": "Completed"})).failures().unwrap().is_empty());
        assert!(stats(json!({"Report": {"Failures": null}})).failures().unwrap().is_empty());
    }

    #[test]
    fn test_failure_without_type_is_malformed() {
        let record = stats(json!({
            "Report": {"Failures": [{"Timestamp": "1", "Message": "no type"}]}
        }));

        let err = record.failures().unwrap_err();
        assert!(matches!(err, ReportError::Summary(_)));
        assert!(err.to_string().contains("#1"));
    }

    #[test]
    fn test_unexpanded_report_is_malformed() {
        let record = stats(json!({"Report": "Microsoft.Exchange...MoveRequestReport"}));
        assert!(record.failures().is_err());
    }

    #[test]
    fn test_batch_endpoint_falls_back_to_target() {
        let batch = MigrationBatch::from_value(json!({
            "Identity": {"Name": "Wave1", "Id": "Wave1"},
            "SourceEndpoint": null,
            "TargetEndpoint": "OnPremEndpoint"
        }))
        .unwrap();

        assert_eq!(batch.name().as_deref(), Some("Wave1"));
        assert_eq!(batch.endpoint_identity().as_deref(), Some("OnPremEndpoint"));
    }

    #[test]
    fn test_latest_move_is_first_history_entry() {
        let mailbox = MailboxStatistics::from_value(json!({
            "DisplayName": "Alice",
            "MoveHistory": [{"Status": "Completed", "n": 1}, {"Status": "Failed", "n": 2}]
        }))
        .unwrap();

        let latest = mailbox.latest_move().unwrap();
        assert_eq!(latest.property("n"), Some(&json!(1)));

        let empty = MailboxStatistics::from_value(json!({"MoveHistory": []})).unwrap();
        assert!(empty.latest_move().is_none());
        assert!(MailboxStatistics::default().latest_move().is_none());
    }

    #[test]
    fn test_record_roundtrip_keeps_unknown_properties() {
        let value = json!({"Identity": "alice", "Nested": {"Deep": [1, 2, {"x": true}]}});
        let record = MoveRequest::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(MigrationUser::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_absent_kinds_for_empty_set() {
        let records = MailboxRecords::empty(MailboxIdentity::new("a@b.c").unwrap());
        assert_eq!(records.absent_kinds().len(), 9);
    }

    #[test]
    fn test_text_of() {
        assert_eq!(text_of(&json!("  ")), None);
        assert_eq!(text_of(&json!(null)), None);
        assert_eq!(text_of(&json!(12.5)).as_deref(), Some("12.5"));
        assert_eq!(text_of(&json!({"Id": "EP1"})).as_deref(), Some("EP1"));
    }
}
