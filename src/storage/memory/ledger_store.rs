use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::{Actor, PostingEntry, PostingKind, ProfitDetail, ProfitYear, Ssn};
use crate::interfaces::ledger_store::{LedgerStore, Result, StorageError};

type Partition = Arc<Mutex<Vec<ProfitDetail>>>;

/// In-memory ledger partitioned by SSN.
///
/// Each SSN has its own mutex, so postings for different participants never
/// wait on each other while two posts of one key serialize.
#[derive(Default)]
pub struct MemoryLedgerStore {
    partitions: RwLock<HashMap<Ssn, Partition>>,
    owners: RwLock<HashMap<i64, Ssn>>,
    last_id: AtomicI64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, ssn: Ssn) -> Partition {
        if let Some(partition) = self.partitions.read().await.get(&ssn) {
            return partition.clone();
        }
        self.partitions
            .write()
            .await
            .entry(ssn)
            .or_default()
            .clone()
    }

    fn stored(&self, entry: PostingEntry, kind: PostingKind, actor: &Actor) -> ProfitDetail {
        ProfitDetail {
            id: self.last_id.fetch_add(1, Ordering::SeqCst) + 1,
            entry,
            kind,
            created_at: Utc::now(),
            user_name: actor.user_name().to_string(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn append(&self, entry: PostingEntry, actor: &Actor) -> Result<ProfitDetail> {
        let partition = self.partition(entry.ssn).await;
        let mut postings = partition.lock().await;

        let key = entry.key();
        if postings.iter().any(|p| p.key() == key) {
            return Err(StorageError::Duplicate {
                entity: "profit_detail",
                key: key.to_string(),
            });
        }

        let detail = self.stored(entry, PostingKind::Original, actor);
        self.owners.write().await.insert(detail.id, detail.entry.ssn);
        postings.push(detail.clone());
        Ok(detail)
    }

    async fn append_reversal(&self, original_id: i64, reason: &str, actor: &Actor) -> Result<ProfitDetail> {
        let not_found = || StorageError::NotFound {
            entity: "profit_detail",
            key: original_id.to_string(),
        };
        let ssn = *self.owners.read().await.get(&original_id).ok_or_else(not_found)?;
        let partition = self.partition(ssn).await;
        let mut postings = partition.lock().await;

        let original = postings
            .iter()
            .find(|p| p.id == original_id)
            .ok_or_else(not_found)?;
        if original.reversal_of().is_some() {
            return Err(StorageError::ReversalOfReversal(original_id));
        }
        if postings.iter().any(|p| p.reversal_of() == Some(original_id)) {
            return Err(StorageError::AlreadyReversed(original_id));
        }

        let next_sequence = postings
            .iter()
            .filter(|p| {
                p.entry.profit_year == original.entry.profit_year
                    && p.entry.profit_code == original.entry.profit_code
            })
            .map(|p| p.entry.distribution_sequence)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(StorageError::SequenceExhausted("distribution_sequence"))?;

        let entry = original.entry.negated(next_sequence);
        let kind = PostingKind::Reversal {
            of: original_id,
            reason: reason.to_string(),
        };
        let detail = self.stored(entry, kind, actor);
        self.owners.write().await.insert(detail.id, ssn);
        postings.push(detail.clone());
        Ok(detail)
    }

    async fn get(&self, id: i64) -> Result<Option<ProfitDetail>> {
        let Some(ssn) = self.owners.read().await.get(&id).copied() else {
            return Ok(None);
        };
        let partition = self.partition(ssn).await;
        let postings = partition.lock().await;
        Ok(postings.iter().find(|p| p.id == id).cloned())
    }

    async fn postings(&self, ssn: Ssn, through_year: Option<ProfitYear>) -> Result<Vec<ProfitDetail>> {
        let partition = self.partition(ssn).await;
        let postings = partition.lock().await;
        let mut result: Vec<ProfitDetail> = postings
            .iter()
            .filter(|p| through_year.map_or(true, |year| p.entry.profit_year <= year))
            .cloned()
            .collect();
        result.sort_by_key(|p| p.id);
        Ok(result)
    }
}
