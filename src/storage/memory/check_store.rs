use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{CheckAction, NewCheck, ProfitShareCheck};
use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::CheckStore;

#[derive(Default)]
struct State {
    checks: BTreeMap<i64, ProfitShareCheck>,
    by_number: HashMap<i64, i64>,
    psc_ids: HashSet<i64>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryCheckStore {
    state: RwLock<State>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn insert_batch(&self, checks: Vec<NewCheck>) -> Result<Vec<ProfitShareCheck>> {
        let mut state = self.state.write().await;

        let mut numbers = HashSet::new();
        let mut psc_ids = HashSet::new();
        for check in &checks {
            if state.by_number.contains_key(&check.check_number) || !numbers.insert(check.check_number) {
                return Err(StorageError::Duplicate {
                    entity: "profit_share_check",
                    key: format!("check_number {}", check.check_number),
                });
            }
            if state.psc_ids.contains(&check.psc_check_id) || !psc_ids.insert(check.psc_check_id) {
                return Err(StorageError::Duplicate {
                    entity: "profit_share_check",
                    key: format!("psc_check_id {}", check.psc_check_id),
                });
            }
        }

        let mut inserted = Vec::with_capacity(checks.len());
        for check in checks {
            state.last_id += 1;
            let id = state.last_id;
            let stored = ProfitShareCheck::from_new(id, check);
            state.by_number.insert(stored.check_number, id);
            state.psc_ids.insert(stored.psc_check_id);
            state.checks.insert(id, stored.clone());
            inserted.push(stored);
        }
        Ok(inserted)
    }

    async fn get(&self, id: i64) -> Result<Option<ProfitShareCheck>> {
        Ok(self.state.read().await.checks.get(&id).cloned())
    }

    async fn by_check_number(&self, check_number: i64) -> Result<Option<ProfitShareCheck>> {
        let state = self.state.read().await;
        Ok(state
            .by_number
            .get(&check_number)
            .and_then(|id| state.checks.get(id))
            .cloned())
    }

    async fn list_for_run(&self, run_id: Uuid) -> Result<Vec<ProfitShareCheck>> {
        let state = self.state.read().await;
        let mut checks: Vec<ProfitShareCheck> = state
            .checks
            .values()
            .filter(|c| c.check_run_workflow_id == Some(run_id))
            .cloned()
            .collect();
        checks.sort_by_key(|c| c.check_number);
        Ok(checks)
    }

    async fn apply(&self, id: i64, action: CheckAction) -> Result<ProfitShareCheck> {
        let mut state = self.state.write().await;
        let check = state.checks.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            entity: "profit_share_check",
            key: id.to_string(),
        })?;
        check.apply(action).map_err(|e| StorageError::InvalidState {
            entity: "profit_share_check",
            key: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(check.clone())
    }
}
