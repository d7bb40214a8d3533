//! File transfer audit storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use super::ledger_store::Result;
use crate::domain::{FileTransferAudit, FtpOperationLog};

/// Append-only transmission records.
#[async_trait]
pub trait TransferAuditStore: Send + Sync {
    async fn append_audit(&self, audit: &FileTransferAudit) -> Result<()>;

    async fn append_operation(&self, operation: &FtpOperationLog) -> Result<()>;

    /// Audit rows of a run, oldest first.
    async fn audits_for(&self, run_id: Uuid) -> Result<Vec<FileTransferAudit>>;

    /// Operation rows of a run, oldest first.
    async fn operations_for(&self, run_id: Uuid) -> Result<Vec<FtpOperationLog>>;
}
