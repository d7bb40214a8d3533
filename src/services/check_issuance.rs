//! Check numbering and the post-issue life of a check.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{Actor, AuditOperation, CheckAction, CheckPayee, CheckRunWorkflow, NewCheck, ProfitShareCheck};
use crate::interfaces::{CheckStore, Sequence, SequenceAllocator, StorageError};
use crate::services::audit_trail::{AuditTrail, PROFIT_SHARE_CHECK_TABLE};

pub type Result<T> = std::result::Result<T, IssuanceError>;

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("No payees to number")]
    NoPayees,

    #[error("Batch of {0} checks exceeds the allocator block size")]
    TooMany(usize),

    #[error("Check not found: {0}")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn check_changes(check: &ProfitShareCheck) -> serde_json::Value {
    json!({
        "check_number": check.check_number,
        "psc_check_id": check.psc_check_id,
        "check_run_workflow_id": check.check_run_workflow_id,
        "ssn": check.ssn.masked(),
        "check_amount": check.check_amount,
        "tax_code": check.tax_code,
        "void_flag": check.void_flag,
        "void_check_date": check.void_check_date,
        "void_recon_date": check.void_recon_date,
        "clear_date": check.clear_date,
        "replace_check": check.replace_check,
    })
}

#[derive(Clone)]
pub struct CheckIssuer {
    checks: Arc<dyn CheckStore>,
    sequences: Arc<dyn SequenceAllocator>,
    audit: AuditTrail,
}

impl CheckIssuer {
    pub fn new(checks: Arc<dyn CheckStore>, sequences: Arc<dyn SequenceAllocator>, audit: AuditTrail) -> Self {
        Self {
            checks,
            sequences,
            audit,
        }
    }

    /// Number one check per payee for `run`.
    ///
    /// Check numbers and psc check ids each come from one contiguous block,
    /// assigned in payee order. A payee whose SSN and demographic match a
    /// check in `replacing` gets that check's number as `replace_check`.
    pub async fn issue(
        &self,
        run: &CheckRunWorkflow,
        payees: &[CheckPayee],
        replacing: &[ProfitShareCheck],
        actor: &Actor,
    ) -> Result<Vec<ProfitShareCheck>> {
        if payees.is_empty() {
            return Err(IssuanceError::NoPayees);
        }
        let count = u32::try_from(payees.len()).map_err(|_| IssuanceError::TooMany(payees.len()))?;

        let numbers = self.sequences.next_block(Sequence::CheckNumber, count).await?;
        let psc_ids = self.sequences.next_block(Sequence::PscCheckId, count).await?;

        let mut replaced = vec![false; replacing.len()];
        let batch: Vec<NewCheck> = payees
            .iter()
            .zip(numbers.clone().zip(psc_ids))
            .map(|(payee, (check_number, psc_check_id))| {
                let replace_check = replacing
                    .iter()
                    .enumerate()
                    .find(|(i, old)| !replaced[*i] && old.ssn == payee.ssn && old.demographic_id == payee.demographic_id)
                    .map(|(i, old)| {
                        replaced[i] = true;
                        old.check_number
                    });
                NewCheck {
                    check_number,
                    psc_check_id,
                    check_run_workflow_id: Some(run.id),
                    ssn: payee.ssn,
                    demographic_id: payee.demographic_id,
                    payable_name: payee.payable_name.clone(),
                    check_amount: payee.amount,
                    tax_code: payee.tax_code,
                    check_date: run.check_run_date,
                    check_run_date: run.check_run_date,
                    manual_check: false,
                    replace_check,
                    other_beneficiary: false,
                    user_name: actor.user_name().to_string(),
                }
            })
            .collect();

        let issued = self.checks.insert_batch(batch).await?;
        for check in &issued {
            self.audit
                .record(
                    PROFIT_SHARE_CHECK_TABLE,
                    AuditOperation::Insert,
                    &check.id.to_string(),
                    &check_changes(check),
                    actor,
                )
                .await?;
        }

        info!(
            run_id = %run.id,
            first = numbers.start,
            last = numbers.end - 1,
            count,
            "Numbered checks"
        );
        Ok(issued)
    }

    /// Void every live check of `run_id`, returning the voided checks.
    pub async fn void_live_for_run(
        &self,
        run_id: uuid::Uuid,
        on: NaiveDate,
        actor: &Actor,
    ) -> Result<Vec<ProfitShareCheck>> {
        let live: Vec<ProfitShareCheck> = self
            .checks
            .list_for_run(run_id)
            .await?
            .into_iter()
            .filter(ProfitShareCheck::is_live)
            .collect();

        let mut voided = Vec::with_capacity(live.len());
        for check in live {
            voided.push(self.apply(check.id, CheckAction::Void { on }, actor).await?);
        }
        if !voided.is_empty() {
            info!(run_id = %run_id, count = voided.len(), "Voided checks for reprint");
        }
        Ok(voided)
    }

    pub async fn void(&self, id: i64, on: NaiveDate, actor: &Actor) -> Result<ProfitShareCheck> {
        self.apply(id, CheckAction::Void { on }, actor).await
    }

    pub async fn reconcile_void(&self, id: i64, on: NaiveDate, actor: &Actor) -> Result<ProfitShareCheck> {
        self.apply(id, CheckAction::ReconcileVoid { on }, actor).await
    }

    /// Record that the bank cleared check `id` on `on`, loaded on `loaded`.
    pub async fn clear(&self, id: i64, on: NaiveDate, loaded: NaiveDate, actor: &Actor) -> Result<ProfitShareCheck> {
        self.apply(id, CheckAction::Clear { on, loaded }, actor).await
    }

    pub async fn list_for_run(&self, run_id: uuid::Uuid) -> Result<Vec<ProfitShareCheck>> {
        Ok(self.checks.list_for_run(run_id).await?)
    }

    pub async fn by_check_number(&self, check_number: i64) -> Result<Option<ProfitShareCheck>> {
        Ok(self.checks.by_check_number(check_number).await?)
    }

    async fn apply(&self, id: i64, action: CheckAction, actor: &Actor) -> Result<ProfitShareCheck> {
        let updated = match self.checks.apply(id, action).await {
            Ok(check) => check,
            Err(StorageError::NotFound { .. }) => return Err(IssuanceError::NotFound(id)),
            Err(e) => {
                warn!(check_id = id, action = ?action, error = %e, "Check update rejected");
                return Err(e.into());
            }
        };
        self.audit
            .record(
                PROFIT_SHARE_CHECK_TABLE,
                AuditOperation::Update,
                &id.to_string(),
                &check_changes(&updated),
                actor,
            )
            .await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ssn, TaxCode};
    use crate::storage::{MemoryAuditSink, MemoryCheckStore, MemorySequenceAllocator};
    use rust_decimal_macros::dec;

    fn issuer() -> CheckIssuer {
        CheckIssuer::new(
            Arc::new(MemoryCheckStore::new()),
            Arc::new(MemorySequenceAllocator::new().with_start(Sequence::CheckNumber, 100_001)),
            AuditTrail::new(Arc::new(MemoryAuditSink::new())),
        )
    }

    fn run() -> CheckRunWorkflow {
        CheckRunWorkflow::new(2025, NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(), 2, &Actor::system())
    }

    fn payee(ssn: u32, demographic_id: i32) -> CheckPayee {
        CheckPayee {
            ssn: Ssn::new(ssn).unwrap(),
            demographic_id,
            payable_name: format!("Payee {demographic_id}"),
            amount: dec!(100.00),
            tax_code: TaxCode::NORMAL_DISTRIBUTION,
            payment_sequence: None,
        }
    }

    #[tokio::test]
    async fn test_issue_allocates_contiguous_numbers() {
        let issuer = issuer();
        let run = run();
        let checks = issuer
            .issue(&run, &[payee(111_111_111, 1), payee(222_222_222, 2), payee(333_333_333, 3)], &[], &Actor::system())
            .await
            .unwrap();

        let numbers: Vec<i64> = checks.iter().map(|c| c.check_number).collect();
        assert_eq!(numbers, vec![100_001, 100_002, 100_003]);
        assert!(checks.iter().all(|c| c.check_run_workflow_id == Some(run.id)));
        assert!(checks.iter().all(|c| c.replace_check.is_none()));
    }

    #[tokio::test]
    async fn test_issue_requires_payees() {
        let issuer = issuer();
        assert!(matches!(
            issuer.issue(&run(), &[], &[], &Actor::system()).await,
            Err(IssuanceError::NoPayees)
        ));
    }

    #[tokio::test]
    async fn test_void_then_reissue_links_replacements() {
        let issuer = issuer();
        let run = run();
        let actor = Actor::new("ops");
        let payees = [payee(111_111_111, 1), payee(222_222_222, 2)];
        issuer.issue(&run, &payees, &[], &actor).await.unwrap();

        let voided = issuer
            .void_live_for_run(run.id, run.check_run_date, &actor)
            .await
            .unwrap();
        assert_eq!(voided.len(), 2);
        assert!(voided.iter().all(|c| c.void_flag));

        let reissued = issuer.issue(&run, &payees, &voided, &actor).await.unwrap();
        assert_eq!(reissued[0].replace_check, Some(100_001));
        assert_eq!(reissued[1].replace_check, Some(100_002));
        assert_eq!(reissued[0].check_number, 100_003);

        let all = issuer.list_for_run(run.id).await.unwrap();
        assert_eq!(all.iter().filter(|c| c.is_live()).count(), 2);
    }

    #[tokio::test]
    async fn test_voided_check_cannot_be_voided_or_cleared() {
        let issuer = issuer();
        let actor = Actor::new("ops");
        let day = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        let checks = issuer.issue(&run(), &[payee(111_111_111, 1)], &[], &actor).await.unwrap();
        let id = checks[0].id;

        issuer.void(id, day, &actor).await.unwrap();
        assert!(matches!(
            issuer.void(id, day, &actor).await,
            Err(IssuanceError::Storage(StorageError::InvalidState { .. }))
        ));
        assert!(matches!(
            issuer.clear(id, day, day, &actor).await,
            Err(IssuanceError::Storage(StorageError::InvalidState { .. }))
        ));
        issuer.reconcile_void(id, day, &actor).await.unwrap();
        assert!(matches!(issuer.void(999, day, &actor).await, Err(IssuanceError::NotFound(999))));
    }
}
