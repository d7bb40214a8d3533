//! SQLite implementations of storage interfaces.

mod check_store;
mod ledger_store;
mod logs;
mod sequence;
mod workflow_store;

pub use check_store::SqliteCheckStore;
pub use ledger_store::SqliteLedgerStore;
pub use logs::{SqliteAuditSink, SqliteTransferAuditStore};
pub use sequence::SqliteSequenceAllocator;
pub use workflow_store::SqliteWorkflowStore;
