//! Append-only in-memory logs: transfer audits, operations, audit events.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{AuditEvent, FileTransferAudit, FtpOperationLog};
use crate::interfaces::ledger_store::Result;
use crate::interfaces::{AuditSink, TransferAuditStore};

#[derive(Default)]
pub struct MemoryTransferAuditStore {
    audits: RwLock<Vec<FileTransferAudit>>,
    operations: RwLock<Vec<FtpOperationLog>>,
}

impl MemoryTransferAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferAuditStore for MemoryTransferAuditStore {
    async fn append_audit(&self, audit: &FileTransferAudit) -> Result<()> {
        self.audits.write().await.push(audit.clone());
        Ok(())
    }

    async fn append_operation(&self, operation: &FtpOperationLog) -> Result<()> {
        self.operations.write().await.push(operation.clone());
        Ok(())
    }

    async fn audits_for(&self, run_id: Uuid) -> Result<Vec<FileTransferAudit>> {
        Ok(self
            .audits
            .read()
            .await
            .iter()
            .filter(|a| a.check_run_workflow_id == Some(run_id))
            .cloned()
            .collect())
    }

    async fn operations_for(&self, run_id: Uuid) -> Result<Vec<FtpOperationLog>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .filter(|o| o.check_run_workflow_id == run_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event, oldest first.
    pub async fn all(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn events_for(&self, table_name: &str, primary_key: &str) -> Result<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.table_name == table_name && e.primary_key == primary_key)
            .cloned()
            .collect())
    }
}
