//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::{AuditSink, CheckStore, LedgerStore, SequenceAllocator, TransferAuditStore, WorkflowStore};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{
    MemoryAuditSink, MemoryCheckStore, MemoryLedgerStore, MemorySequenceAllocator, MemoryTransferAuditStore,
    MemoryWorkflowStore,
};

#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteAuditSink, SqliteCheckStore, SqliteLedgerStore, SqliteSequenceAllocator, SqliteTransferAuditStore,
    SqliteWorkflowStore,
};

/// Every store the services need, behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub ledger: Arc<dyn LedgerStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub checks: Arc<dyn CheckStore>,
    pub transfers: Arc<dyn TransferAuditStore>,
    pub audit: Arc<dyn AuditSink>,
    pub sequences: Arc<dyn SequenceAllocator>,
}

impl Storage {
    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(MemoryLedgerStore::new()),
            workflows: Arc::new(MemoryWorkflowStore::new()),
            checks: Arc::new(MemoryCheckStore::new()),
            transfers: Arc::new(MemoryTransferAuditStore::new()),
            audit: Arc::new(MemoryAuditSink::new()),
            sequences: Arc::new(MemorySequenceAllocator::new()),
        }
    }

    /// SQLite stores sharing `pool`, with schema applied.
    #[cfg(feature = "sqlite")]
    pub async fn sqlite(pool: sqlx::SqlitePool) -> crate::interfaces::ledger_store::Result<Self> {
        let ledger = SqliteLedgerStore::new(pool.clone());
        ledger.init().await?;
        let workflows = SqliteWorkflowStore::new(pool.clone());
        workflows.init().await?;
        let checks = SqliteCheckStore::new(pool.clone());
        checks.init().await?;
        let transfers = SqliteTransferAuditStore::new(pool.clone());
        transfers.init().await?;
        let audit = SqliteAuditSink::new(pool.clone());
        audit.init().await?;
        let sequences = SqliteSequenceAllocator::new(pool);
        sequences.init().await?;

        Ok(Self {
            ledger: Arc::new(ledger),
            workflows: Arc::new(workflows),
            checks: Arc::new(checks),
            transfers: Arc::new(transfers),
            audit: Arc::new(audit),
            sequences: Arc::new(sequences),
        })
    }
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Storage, Box<dyn std::error::Error + Send + Sync>> {
    info!(storage_type = %config.storage_type, "Initializing storage");

    match config.storage_type {
        StorageType::Memory => Ok(Storage::in_memory()),
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let path = &config.sqlite.path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!(path = %path, "Opening SQLite database");

            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(config.sqlite.max_connections)
                .connect(&format!("sqlite:{}?mode=rwc", path))
                .await?;

            Ok(Storage::sqlite(pool).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}
