//! Profit ledger.
//!
//! Append-only postings with reversal by reference. Balances are read
//! models computed from the stored rows; nothing is ever updated.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::profit_detail::AmountDefect;
use crate::domain::{Actor, LedgerBalance, PostingEntry, PostingKey, ProfitCode, ProfitDetail, ProfitYear, Ssn};
use crate::interfaces::{LedgerStore, StorageError};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid posting {key}: {defect}")]
    Validation {
        key: PostingKey,
        #[source]
        defect: AmountDefect,
    },

    #[error("Posting key {0} already exists")]
    DuplicateSequence(PostingKey),

    #[error("Posting {0} not found")]
    NotFound(i64),

    #[error("Posting {0} is already reversed")]
    AlreadyReversed(i64),

    #[error("Posting {0} is a reversal; post a new entry instead")]
    CannotReverseReversal(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct ProfitLedger {
    store: Arc<dyn LedgerStore>,
}

impl ProfitLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Append an original posting.
    pub async fn post(&self, entry: PostingEntry, actor: &Actor) -> Result<ProfitDetail> {
        let key = entry.key();
        entry
            .validate_amounts()
            .map_err(|defect| LedgerError::Validation { key, defect })?;

        match self.store.append(entry, actor).await {
            Ok(detail) => {
                info!(
                    posting_id = detail.id,
                    key = %key,
                    user = %actor.user_name(),
                    "Posted profit detail"
                );
                Ok(detail)
            }
            Err(StorageError::Duplicate { .. }) => {
                warn!(key = %key, "Duplicate posting key");
                Err(LedgerError::DuplicateSequence(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append the compensating posting for `original_id`.
    pub async fn reverse(&self, original_id: i64, reason: &str, actor: &Actor) -> Result<ProfitDetail> {
        let detail = self
            .store
            .append_reversal(original_id, reason, actor)
            .await
            .map_err(|e| match e {
                StorageError::NotFound { .. } => LedgerError::NotFound(original_id),
                StorageError::AlreadyReversed(id) => LedgerError::AlreadyReversed(id),
                StorageError::ReversalOfReversal(id) => LedgerError::CannotReverseReversal(id),
                other => LedgerError::Storage(other),
            })?;

        info!(
            posting_id = detail.id,
            reversed = original_id,
            key = %detail.key(),
            reason,
            user = %actor.user_name(),
            "Reversed profit detail"
        );
        Ok(detail)
    }

    /// Totals of one profit year.
    pub async fn balance(&self, ssn: Ssn, profit_year: ProfitYear) -> Result<LedgerBalance> {
        let postings = self.store.postings(ssn, Some(profit_year)).await?;
        Ok(LedgerBalance::from_postings(
            postings.iter().filter(|p| p.entry.profit_year == profit_year),
        ))
    }

    /// Totals of every profit year up to and including `through_year`.
    pub async fn cumulative_balance(&self, ssn: Ssn, through_year: ProfitYear) -> Result<LedgerBalance> {
        let postings = self.store.postings(ssn, Some(through_year)).await?;
        Ok(LedgerBalance::from_postings(&postings))
    }

    /// Every posting of `ssn` in id order, reversals included.
    pub async fn history(&self, ssn: Ssn) -> Result<Vec<ProfitDetail>> {
        Ok(self.store.postings(ssn, None).await?)
    }

    pub async fn get(&self, id: i64) -> Result<ProfitDetail> {
        self.store.get(id).await?.ok_or(LedgerError::NotFound(id))
    }

    /// Earliest year with an effective incoming contribution.
    pub async fn first_contribution_year(&self, ssn: Ssn, through_year: ProfitYear) -> Result<Option<ProfitYear>> {
        let postings = self.store.postings(ssn, Some(through_year)).await?;
        let reversed: HashSet<i64> = postings.iter().filter_map(|p| p.reversal_of()).collect();
        Ok(postings
            .iter()
            .filter(|p| p.reversal_of().is_none() && !reversed.contains(&p.id))
            .filter(|p| p.entry.profit_code == ProfitCode::Incoming && p.entry.contribution > rust_decimal::Decimal::ZERO)
            .map(|p| p.entry.profit_year)
            .min())
    }
}
