//! Abstract interfaces for storage and external collaborators.
//!
//! These traits define the contracts for:
//! - Profit ledger postings (append-only)
//! - Check-run workflow rows and their payees
//! - Issued checks
//! - File transfer audit and operation logs
//! - Audit trail events
//! - Sequence allocation

pub mod audit_sink;
pub mod check_store;
pub mod ledger_store;
pub mod sequence;
pub mod transfer_audit_store;
pub mod workflow_store;

pub use audit_sink::AuditSink;
pub use check_store::CheckStore;
pub use ledger_store::{LedgerStore, StorageError};
pub use sequence::{Sequence, SequenceAllocator};
pub use transfer_audit_store::TransferAuditStore;
pub use workflow_store::WorkflowStore;
