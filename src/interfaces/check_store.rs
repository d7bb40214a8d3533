//! Issued check storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use super::ledger_store::Result;
use crate::domain::{CheckAction, NewCheck, ProfitShareCheck};

#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Insert a batch of checks atomically.
    ///
    /// Fails with `Duplicate` if any check number or psc check id is taken;
    /// nothing is inserted in that case.
    async fn insert_batch(&self, checks: Vec<NewCheck>) -> Result<Vec<ProfitShareCheck>>;

    async fn get(&self, id: i64) -> Result<Option<ProfitShareCheck>>;

    async fn by_check_number(&self, check_number: i64) -> Result<Option<ProfitShareCheck>>;

    /// Checks linked to a run, ordered by check number.
    async fn list_for_run(&self, run_id: Uuid) -> Result<Vec<ProfitShareCheck>>;

    /// Apply `action` to the check with `id` as a compare-and-set.
    ///
    /// Fails with `InvalidState` when the stored row rejects the action.
    async fn apply(&self, id: i64, action: CheckAction) -> Result<ProfitShareCheck>;
}
