use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{CheckPayee, CheckRunWorkflow, ProfitYear, StepStatus};
use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::WorkflowStore;

#[derive(Default)]
pub struct MemoryWorkflowStore {
    runs: RwLock<HashMap<Uuid, CheckRunWorkflow>>,
    payees: RwLock<HashMap<Uuid, Vec<CheckPayee>>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn create(&self, run: &CheckRunWorkflow) -> Result<()> {
        let mut runs = self.runs.write().await;
        let clash = runs.values().any(|r| {
            r.profit_year == run.profit_year
                && r.check_run_date == run.check_run_date
                && r.status != StepStatus::Failed
        });
        if clash || runs.contains_key(&run.id) {
            return Err(StorageError::Duplicate {
                entity: "check_run_workflow",
                key: format!("{}/{}", run.profit_year, run.check_run_date),
            });
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<CheckRunWorkflow>> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn find_active(&self, profit_year: ProfitYear, check_run_date: NaiveDate) -> Result<Option<CheckRunWorkflow>> {
        Ok(self
            .runs
            .read()
            .await
            .values()
            .find(|r| {
                r.profit_year == profit_year && r.check_run_date == check_run_date && r.status != StepStatus::Failed
            })
            .cloned())
    }

    async fn list_for_year(&self, profit_year: ProfitYear) -> Result<Vec<CheckRunWorkflow>> {
        let mut runs: Vec<CheckRunWorkflow> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.profit_year == profit_year)
            .cloned()
            .collect();
        runs.sort_by_key(|r| (r.check_run_date, r.created_at));
        Ok(runs)
    }

    async fn update(&self, run: &CheckRunWorkflow, expected_version: u32) -> Result<()> {
        let mut runs = self.runs.write().await;
        let stored = runs.get_mut(&run.id).ok_or_else(|| StorageError::NotFound {
            entity: "check_run_workflow",
            key: run.id.to_string(),
        })?;
        if stored.is_terminal() {
            return Err(StorageError::InvalidState {
                entity: "check_run_workflow",
                key: run.id.to_string(),
                reason: format!("run is {}", stored.status),
            });
        }
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                entity: "check_run_workflow",
                key: run.id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = run.clone();
        Ok(())
    }

    async fn replace_payees(&self, run_id: Uuid, payees: &[CheckPayee]) -> Result<()> {
        if !self.runs.read().await.contains_key(&run_id) {
            return Err(StorageError::NotFound {
                entity: "check_run_workflow",
                key: run_id.to_string(),
            });
        }
        self.payees.write().await.insert(run_id, payees.to_vec());
        Ok(())
    }

    async fn payees(&self, run_id: Uuid) -> Result<Vec<CheckPayee>> {
        Ok(self
            .payees
            .read()
            .await
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }
}
