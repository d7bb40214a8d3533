use async_trait::async_trait;

use super::ledger_store::Result;
use crate::domain::AuditEvent;

/// Destination for change-log events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<()>;

    /// Events for one row, oldest first.
    async fn events_for(&self, table_name: &str, primary_key: &str) -> Result<Vec<AuditEvent>>;
}
