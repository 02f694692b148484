//! In-memory service for testing
//!
//! Records are registered up front; any record kind can be made to fail
//! with a service error. Every query is logged so tests can assert which
//! lookups were made.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::MigrationService;
use crate::error::{ReportError, Result};
use crate::records::{
    MailboxIdentity, MailboxStatistics, MigrationBatch, MigrationConfig, MigrationEndpoint,
    MigrationUser, MigrationUserStatistics, MoveRequest, MoveRequestStatistics, Properties,
    Record, RecordKind,
};

/// Key used for the tenant-wide config
const TENANT_KEY: &str = "";

/// A query made against the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCall {
    pub kind: RecordKind,
    pub identity: String,
}

#[derive(Default)]
pub struct InMemoryService {
    records: HashMap<(RecordKind, String), Properties>,
    failures: HashMap<RecordKind, String>,
    calls: Mutex<Vec<QueryCall>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under the identity it is queried by
    pub fn with_record<R: Record>(mut self, identity: &str, record: R) -> Self {
        self.records
            .insert((R::KIND, identity.to_string()), record.properties().clone());
        self
    }

    /// Register a record from a JSON object literal
    ///
    /// Non-object values are ignored.
    pub fn with_json(mut self, kind: RecordKind, identity: &str, value: Value) -> Self {
        if let Value::Object(properties) = value {
            self.records.insert((kind, identity.to_string()), properties);
        }
        self
    }

    pub fn with_config(self, config: MigrationConfig) -> Self {
        self.with_record(TENANT_KEY, config)
    }

    /// Make every query for `kind` fail
    pub fn failing(mut self, kind: RecordKind, message: &str) -> Self {
        self.failures.insert(kind, message.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<QueryCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, kind: RecordKind) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.kind == kind)
            .count()
    }

    async fn lookup<R: Record>(&self, identity: &str) -> Result<Option<R>> {
        self.calls.lock().await.push(QueryCall {
            kind: R::KIND,
            identity: identity.to_string(),
        });

        if let Some(message) = self.failures.get(&R::KIND) {
            return Err(ReportError::Service(message.clone()));
        }

        match self.records.get(&(R::KIND, identity.to_string())) {
            Some(properties) => R::from_value(Value::Object(properties.clone())).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl MigrationService for InMemoryService {
    async fn move_request(&self, mailbox: &MailboxIdentity) -> Result<Option<MoveRequest>> {
        self.lookup(mailbox.as_str()).await
    }

    async fn move_request_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MoveRequestStatistics>> {
        self.lookup(mailbox.as_str()).await
    }

    async fn migration_user(&self, mailbox: &MailboxIdentity) -> Result<Option<MigrationUser>> {
        self.lookup(mailbox.as_str()).await
    }

    async fn migration_user_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MigrationUserStatistics>> {
        self.lookup(mailbox.as_str()).await
    }

    async fn migration_batch(&self, batch_name: &str) -> Result<Option<MigrationBatch>> {
        self.lookup(batch_name).await
    }

    async fn migration_endpoint(&self, endpoint: &str) -> Result<Option<MigrationEndpoint>> {
        self.lookup(endpoint).await
    }

    async fn migration_config(&self) -> Result<Option<MigrationConfig>> {
        self.lookup(TENANT_KEY).await
    }

    async fn mailbox_statistics(
        &self,
        mailbox: &MailboxIdentity,
    ) -> Result<Option<MailboxStatistics>> {
        self.lookup(mailbox.as_str()).await
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_registered_record_is_returned() {
        let service = InMemoryService::new().with_json(
            RecordKind::MoveRequest,
            "alice@contoso.com",
            json!({"Status": "InProgress"}),
        );
        let mailbox = MailboxIdentity::new("alice@contoso.com").unwrap();

        let record = service.move_request(&mailbox).await.unwrap().unwrap();
        assert_eq!(record.property("Status").unwrap(), "InProgress");
        assert_eq!(service.call_count(RecordKind::MoveRequest).await, 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let service = InMemoryService::new().failing(RecordKind::MigrationConfig, "throttled");

        let err = service.migration_config().await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: throttled");
    }

    #[tokio::test]
    async fn test_unknown_identity_is_absent() {
        let service = InMemoryService::new();
        assert!(service.migration_batch("Wave1").await.unwrap().is_none());
        assert_eq!(
            service.calls().await,
            vec![QueryCall {
                kind: RecordKind::MigrationBatch,
                identity: "Wave1".to_string()
            }]
        );
    }
}
