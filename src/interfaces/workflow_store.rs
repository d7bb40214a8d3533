//! Check-run workflow storage interface.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::ledger_store::Result;
use crate::domain::{CheckPayee, CheckRunWorkflow, ProfitYear};

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new run.
    ///
    /// Fails with `Duplicate` while a non-failed run exists for the same
    /// (profit year, run date).
    async fn create(&self, run: &CheckRunWorkflow) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<CheckRunWorkflow>>;

    /// The non-failed run for (profit year, run date), if any.
    async fn find_active(&self, profit_year: ProfitYear, check_run_date: NaiveDate) -> Result<Option<CheckRunWorkflow>>;

    async fn list_for_year(&self, profit_year: ProfitYear) -> Result<Vec<CheckRunWorkflow>>;

    /// Persist `run` if the stored version still equals `expected_version`.
    ///
    /// Fails with `VersionConflict` otherwise, and with `InvalidState` when
    /// the stored row is already terminal.
    async fn update(&self, run: &CheckRunWorkflow, expected_version: u32) -> Result<()>;

    /// Replace the finalized payee list of a run.
    async fn replace_payees(&self, run_id: Uuid, payees: &[CheckPayee]) -> Result<()>;

    async fn payees(&self, run_id: Uuid) -> Result<Vec<CheckPayee>>;
}
