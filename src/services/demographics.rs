//! Participant directory.
//!
//! Badge numbers are unique and an SSN belongs to at most one participant
//! for the lifetime of the directory. SSN changes append a history record.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::audit_trail::{AuditTrail, DEMOGRAPHIC_TABLE};
use crate::domain::ssn::InvalidSsn;
use crate::domain::{Actor, AuditOperation, Demographic, HcmRecord, Ssn, SsnChangeRecord};
use crate::interfaces::{Sequence, SequenceAllocator, StorageError};

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Demographic {0} not found")]
    NotFound(i32),

    #[error("SSN {ssn} already belongs to demographic {owner}")]
    SsnInUse { ssn: Ssn, owner: i32 },

    #[error("Placeholder SSN out of range: {0}")]
    InvalidPlaceholder(#[from] InvalidSsn),

    #[error("HCM feed error: {0}")]
    Feed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Source of participant records, keyed by badge number.
#[async_trait]
pub trait HcmFeed: Send + Sync {
    async fn records(&self) -> Result<Vec<HcmRecord>>;
}

#[derive(Default)]
struct DirectoryState {
    by_id: BTreeMap<i32, Demographic>,
    by_badge: HashMap<i32, i32>,
    /// Every SSN ever assigned, with the participant it went to.
    ssn_owner: HashMap<Ssn, i32>,
    history: Vec<SsnChangeRecord>,
    last_id: i32,
}

impl DirectoryState {
    fn claim_ssn(&mut self, ssn: Ssn, id: i32) -> Result<()> {
        match self.ssn_owner.get(&ssn) {
            Some(owner) if *owner != id => Err(DirectoryError::SsnInUse { ssn, owner: *owner }),
            _ => {
                self.ssn_owner.insert(ssn, id);
                Ok(())
            }
        }
    }

    fn change_ssn(&mut self, id: i32, new_ssn: Ssn, actor: &Actor) -> Result<Option<SsnChangeRecord>> {
        let old_ssn = self.by_id.get(&id).ok_or(DirectoryError::NotFound(id))?.ssn;
        if old_ssn == new_ssn {
            return Ok(None);
        }
        self.claim_ssn(new_ssn, id)?;

        if let Some(demographic) = self.by_id.get_mut(&id) {
            demographic.ssn = new_ssn;
        }
        let record = SsnChangeRecord {
            demographic_id: id,
            old_ssn,
            new_ssn,
            user_name: actor.user_name().to_string(),
            changed_at: Utc::now(),
        };
        self.history.push(record.clone());
        Ok(Some(record))
    }
}

pub struct DemographicDirectory {
    state: RwLock<DirectoryState>,
    sequences: Arc<dyn SequenceAllocator>,
    audit: AuditTrail,
}

impl DemographicDirectory {
    pub fn new(sequences: Arc<dyn SequenceAllocator>, audit: AuditTrail) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            sequences,
            audit,
        }
    }

    /// Insert or update the participant with `record.badge_number`.
    ///
    /// A changed SSN goes through the same path as [`Self::change_ssn`].
    pub async fn upsert_by_badge(&self, record: HcmRecord, actor: &Actor) -> Result<Demographic> {
        let badge = record.badge_number;
        let (demographic, operation, change) = {
            let mut state = self.state.write().await;
            match state.by_badge.get(&badge).copied() {
                Some(id) => {
                    let change = state.change_ssn(id, record.ssn, actor)?;
                    let updated = record.into_demographic(id);
                    state.by_id.insert(id, updated.clone());
                    (updated, AuditOperation::Update, change)
                }
                None => {
                    let id = state.last_id + 1;
                    state.claim_ssn(record.ssn, id)?;
                    state.last_id = id;
                    let created = record.into_demographic(id);
                    state.by_badge.insert(badge, id);
                    state.by_id.insert(id, created.clone());
                    (created, AuditOperation::Insert, None)
                }
            }
        };

        if let Some(change) = &change {
            self.audit_ssn_change(change, actor).await?;
        }
        let changes = json!({
            "badge_number": demographic.badge_number,
            "ssn": demographic.ssn.masked(),
            "full_name": demographic.full_name(),
            "pay_classification_id": demographic.pay_classification_id,
            "employment_status": demographic.employment_status,
            "dates": demographic.dates,
        });
        self.audit
            .record(DEMOGRAPHIC_TABLE, operation, &demographic.id.to_string(), &changes, actor)
            .await?;
        info!(
            demographic_id = demographic.id,
            badge,
            operation = %operation,
            "Upserted demographic"
        );
        Ok(demographic)
    }

    /// Pull every record from `feed` and upsert it. Returns the number applied.
    pub async fn sync(&self, feed: &dyn HcmFeed, actor: &Actor) -> Result<usize> {
        let records = feed.records().await?;
        let mut applied = 0;
        for record in records {
            let badge = record.badge_number;
            match self.upsert_by_badge(record, actor).await {
                Ok(_) => applied += 1,
                Err(DirectoryError::SsnInUse { ssn, owner }) => {
                    warn!(badge, ssn = %ssn, owner, "Skipping HCM record with SSN owned by another participant");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(applied)
    }

    pub async fn get(&self, id: i32) -> Option<Demographic> {
        self.state.read().await.by_id.get(&id).cloned()
    }

    pub async fn by_badge(&self, badge_number: i32) -> Option<Demographic> {
        let state = self.state.read().await;
        state
            .by_badge
            .get(&badge_number)
            .and_then(|id| state.by_id.get(id))
            .cloned()
    }

    /// The participant currently holding `ssn`.
    pub async fn by_ssn(&self, ssn: Ssn) -> Option<Demographic> {
        let state = self.state.read().await;
        state
            .ssn_owner
            .get(&ssn)
            .and_then(|id| state.by_id.get(id))
            .filter(|d| d.ssn == ssn)
            .cloned()
    }

    /// Replace the SSN of participant `id`, recording the change.
    pub async fn change_ssn(&self, id: i32, new_ssn: Ssn, actor: &Actor) -> Result<Option<SsnChangeRecord>> {
        let change = self.state.write().await.change_ssn(id, new_ssn, actor)?;
        if let Some(change) = &change {
            self.audit_ssn_change(change, actor).await?;
            info!(demographic_id = id, old = %change.old_ssn, new = %change.new_ssn, "Changed SSN");
        }
        Ok(change)
    }

    /// Give participant `id` the next free placeholder SSN.
    pub async fn assign_placeholder_ssn(&self, id: i32, actor: &Actor) -> Result<Ssn> {
        if self.get(id).await.is_none() {
            return Err(DirectoryError::NotFound(id));
        }
        loop {
            let value = self.sequences.next_value(Sequence::FakeSsn).await?;
            let ssn = Ssn::try_from(value)?;
            match self.change_ssn(id, ssn, actor).await {
                Ok(_) => return Ok(ssn),
                Err(DirectoryError::SsnInUse { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// SSN changes of participant `id`, oldest first.
    pub async fn ssn_history(&self, id: i32) -> Vec<SsnChangeRecord> {
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|r| r.demographic_id == id)
            .cloned()
            .collect()
    }

    async fn audit_ssn_change(&self, change: &SsnChangeRecord, actor: &Actor) -> Result<()> {
        let changes = json!({
            "old_ssn": change.old_ssn.masked(),
            "new_ssn": change.new_ssn.masked(),
        });
        self.audit
            .record(
                DEMOGRAPHIC_TABLE,
                AuditOperation::Update,
                &change.demographic_id.to_string(),
                &changes,
                actor,
            )
            .await?;
        Ok(())
    }
}
