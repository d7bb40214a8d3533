//! Profit ledger storage interface.

use async_trait::async_trait;

use crate::domain::{Actor, PostingEntry, ProfitDetail, ProfitYear, Ssn};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Posting {0} is already reversed")]
    AlreadyReversed(i64),

    #[error("Posting {0} is a reversal and cannot be reversed")]
    ReversalOfReversal(i64),

    #[error("Version conflict on {entity} {key}: expected {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        key: String,
        expected: u32,
        actual: u32,
    },

    #[error("Invalid state for {entity} {key}: {reason}")]
    InvalidState {
        entity: &'static str,
        key: String,
        reason: String,
    },

    #[error("Sequence {0} exhausted")]
    SequenceExhausted(&'static str),

    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn corrupt(table: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            table,
            reason: reason.to_string(),
        }
    }
}

/// Append-only store of profit detail postings.
///
/// Rows are never updated or deleted. A reversal is a new row whose kind
/// references the original.
///
/// Implementations:
/// - `MemoryLedgerStore`: in-process, partitioned by SSN
/// - `SqliteLedgerStore`: SQLite with a unique index on the posting key
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an original posting.
    ///
    /// Fails with `Duplicate` when the (SSN, year, code, sequence) key exists.
    /// Of two concurrent appends of one key exactly one succeeds.
    async fn append(&self, entry: PostingEntry, actor: &Actor) -> Result<ProfitDetail>;

    /// Append the compensating posting for `original_id`.
    ///
    /// The lookup, the already-reversed check and the insert happen under
    /// the same guard. The reversal takes the next free distribution
    /// sequence of the original's (SSN, year, code).
    async fn append_reversal(&self, original_id: i64, reason: &str, actor: &Actor) -> Result<ProfitDetail>;

    /// Fetch one posting.
    async fn get(&self, id: i64) -> Result<Option<ProfitDetail>>;

    /// All postings for an SSN, reversals included, in id order.
    ///
    /// `through_year` limits the result to profit years at or before it.
    async fn postings(&self, ssn: Ssn, through_year: Option<ProfitYear>) -> Result<Vec<ProfitDetail>>;
}
