//! In-memory storage implementations.
//!
//! Used for tests and for running a check run without a database.

mod check_store;
mod ledger_store;
mod logs;
mod sequence;
mod workflow_store;

pub use check_store::MemoryCheckStore;
pub use ledger_store::MemoryLedgerStore;
pub use logs::{MemoryAuditSink, MemoryTransferAuditStore};
pub use sequence::MemorySequenceAllocator;
pub use workflow_store::MemoryWorkflowStore;
