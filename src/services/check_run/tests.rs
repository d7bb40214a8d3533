use super::*;
use crate::domain::{FileTransferAudit, FtpOperationLog, Ssn, StepStatus, TaxCode};
use crate::domain::{CheckAction, NewCheck};
use crate::interfaces::{AuditSink, CheckStore, TransferAuditStore};
use crate::services::file_transfer::{FilesystemTransport, TransportError};
use crate::storage::{MemoryCheckStore, MemoryTransferAuditStore};
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Rejecting;

#[async_trait]
impl PaymentFileTransport for Rejecting {
    async fn upload(&self, _file_name: &str, _destination: &str, _payload: &[u8]) -> std::result::Result<(), TransportError> {
        Err(TransportError::Unavailable("partner offline".into()))
    }
}

struct Accepting;

#[async_trait]
impl PaymentFileTransport for Accepting {
    async fn upload(&self, _file_name: &str, _destination: &str, _payload: &[u8]) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}

/// Loses every transfer audit row; operations are kept.
#[derive(Default)]
struct LosingAudits {
    inner: MemoryTransferAuditStore,
}

#[async_trait]
impl TransferAuditStore for LosingAudits {
    async fn append_audit(&self, _audit: &FileTransferAudit) -> crate::interfaces::ledger_store::Result<()> {
        Err(StorageError::corrupt("file_transfer_audit", "disk full"))
    }

    async fn append_operation(&self, operation: &FtpOperationLog) -> crate::interfaces::ledger_store::Result<()> {
        self.inner.append_operation(operation).await
    }

    async fn audits_for(&self, run_id: Uuid) -> crate::interfaces::ledger_store::Result<Vec<FileTransferAudit>> {
        self.inner.audits_for(run_id).await
    }

    async fn operations_for(&self, run_id: Uuid) -> crate::interfaces::ledger_store::Result<Vec<FtpOperationLog>> {
        self.inner.operations_for(run_id).await
    }
}

/// Fails the second check batch; everything else reaches the memory store.
#[derive(Default)]
struct FailingSecondBatch {
    inner: MemoryCheckStore,
    batches: AtomicUsize,
}

#[async_trait]
impl CheckStore for FailingSecondBatch {
    async fn insert_batch(&self, checks: Vec<NewCheck>) -> crate::interfaces::ledger_store::Result<Vec<ProfitShareCheck>> {
        if self.batches.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(StorageError::corrupt("profit_share_check", "disk full"));
        }
        self.inner.insert_batch(checks).await
    }

    async fn get(&self, id: i64) -> crate::interfaces::ledger_store::Result<Option<ProfitShareCheck>> {
        self.inner.get(id).await
    }

    async fn by_check_number(&self, check_number: i64) -> crate::interfaces::ledger_store::Result<Option<ProfitShareCheck>> {
        self.inner.by_check_number(check_number).await
    }

    async fn list_for_run(&self, run_id: Uuid) -> crate::interfaces::ledger_store::Result<Vec<ProfitShareCheck>> {
        self.inner.list_for_run(run_id).await
    }

    async fn apply(&self, id: i64, action: CheckAction) -> crate::interfaces::ledger_store::Result<ProfitShareCheck> {
        self.inner.apply(id, action).await
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 15).unwrap()
}

fn config() -> CheckRunConfig {
    CheckRunConfig {
        confirmation_poll_interval_ms: 5,
        ..CheckRunConfig::default()
    }
}

fn service_with(storage: &Storage, config: CheckRunConfig) -> CheckRunService {
    CheckRunService::new(storage, config, TransferRetryConfig::immediate(2))
}

fn line(ssn: u32, demographic_id: i32, amount: rust_decimal::Decimal) -> PayeeLine {
    PayeeLine {
        ssn: Some(Ssn::new(ssn).unwrap()),
        demographic_id,
        payable_name: format!("Payee {demographic_id}"),
        amount,
        tax_code: TaxCode::NORMAL_DISTRIBUTION,
        payment_sequence: Some(1),
    }
}

fn lines() -> Vec<PayeeLine> {
    vec![
        line(111_111_111, 1, dec!(1500.00)),
        line(222_222_222, 2, dec!(250.25)),
        line(333_333_333, 3, dec!(0.00)),
    ]
}

/// Start a run and drive it to `Printed`.
async fn printed_run(svc: &CheckRunService, actor: &Actor) -> CheckRunWorkflow {
    let run = svc.start_run(2025, date(), actor).await.unwrap();
    svc.calculate_balances(run.id, lines(), actor).await.unwrap();
    svc.number_checks(run.id, actor).await.unwrap();
    svc.mark_printed(run.id, actor).await.unwrap()
}

#[tokio::test]
async fn test_happy_path_confirms() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::new("ops");
    let dir = tempfile::tempdir().unwrap();
    let transport = FilesystemTransport::new(dir.path());

    let run = printed_run(&svc, &actor).await;
    assert_eq!(run.step, CheckRunStep::Printed);
    assert_eq!(run.check_number, Some(1));

    let outcome = svc.transfer(run.id, &transport, &actor).await.unwrap();
    assert_eq!(outcome.file_name, "PSCHECKS_2025_20251215_0.csv");
    assert!(transport.path_for(&outcome.file_name).exists());
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Transferred);

    let run = svc.confirm(run.id, &actor).await.unwrap();
    assert_eq!(run.step, CheckRunStep::Confirmed);
    assert_eq!(run.status, StepStatus::Completed);
    assert_eq!(run.reprint_count, 0);

    let events = storage
        .audit
        .events_for(CHECK_RUN_WORKFLOW_TABLE, &run.id.to_string())
        .await
        .unwrap();
    // start, balances, numbering, print, transfer, confirm
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.verify() && e.user_name == "ops"));
}

#[tokio::test]
async fn test_second_start_rejected_until_first_fails() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();

    let first = svc.start_run(2025, date(), &actor).await.unwrap();
    let err = svc.start_run(2025, date(), &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Duplicate { existing, .. } if existing.run_id == first.id));

    // A different date is independent.
    svc.start_run(2025, date().succ_opt().unwrap(), &actor).await.unwrap();

    svc.fail(first.id, "operator abort", &actor).await.unwrap();
    let second = svc.start_run(2025, date(), &actor).await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(svc.active_run(2025, date()).await.unwrap().map(|r| r.id), Some(second.id));
}

#[tokio::test]
async fn test_empty_payees_do_not_advance() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = svc.start_run(2025, date(), &actor).await.unwrap();

    let err = svc.calculate_balances(run.id, vec![], &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Validation { .. }));
    let stored = svc.get(run.id).await.unwrap();
    assert_eq!(stored.step, CheckRunStep::Created);
    assert_eq!(stored.status, StepStatus::InProgress);
}

#[tokio::test]
async fn test_negative_amount_fails_run() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = svc.start_run(2025, date(), &actor).await.unwrap();

    let mut payees = lines();
    payees[1].amount = dec!(-5.00);
    let err = svc.calculate_balances(run.id, payees, &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Validation { .. }));
    assert!(err.to_string().contains(&run.id.to_string()));

    let stored = svc.get(run.id).await.unwrap();
    assert_eq!(stored.status, StepStatus::Failed);
    assert!(stored.failure_reason.unwrap().contains("negative"));
}

#[tokio::test]
async fn test_steps_cannot_be_skipped() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = svc.start_run(2025, date(), &actor).await.unwrap();

    assert!(matches!(
        svc.number_checks(run.id, &actor).await,
        Err(CheckRunError::NotAllowed { operation: "number_checks", .. })
    ));
    assert!(matches!(
        svc.mark_printed(run.id, &actor).await,
        Err(CheckRunError::NotAllowed { .. })
    ));
    assert!(matches!(
        svc.transfer(run.id, &Accepting, &actor).await,
        Err(CheckRunError::NotAllowed { .. })
    ));
    assert!(matches!(svc.confirm(run.id, &actor).await, Err(CheckRunError::NotAllowed { .. })));

    svc.calculate_balances(run.id, lines(), &actor).await.unwrap();
    svc.number_checks(run.id, &actor).await.unwrap();
    // Live checks already exist.
    assert!(matches!(
        svc.number_checks(run.id, &actor).await,
        Err(CheckRunError::NotAllowed { .. })
    ));
}

#[tokio::test]
async fn test_failed_transfer_stays_printed() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;

    let err = svc.transfer(run.id, &Rejecting, &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::RetryableTransfer { .. }));
    assert!(err.is_retryable());
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Printed);

    let attempts = svc.transfers().auditor().attempts(run.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].is_success);
    let ops = svc.transfers().auditor().operations(run.id).await.unwrap();
    assert_eq!(ops.iter().filter(|o| !o.is_success).count(), 2);

    svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Transferred);
}

#[tokio::test]
async fn test_reprint_voids_and_renumbers() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    let before = svc.payment_file(run.id).await.unwrap();

    let reissued = svc.reprint(run.id, "printer jam", &actor).await.unwrap();
    let numbers: Vec<i64> = reissued.iter().map(|c| c.check_number).collect();
    assert_eq!(numbers, vec![4, 5, 6]);
    assert_eq!(reissued[0].replace_check, Some(1));

    let run = svc.get(run.id).await.unwrap();
    assert_eq!(run.step, CheckRunStep::ChecksNumbered);
    assert_eq!(run.reprint_count, 1);
    assert_eq!(run.check_number, Some(4));

    let checks = svc.checks(run.id).await.unwrap();
    assert_eq!(checks.len(), 6);
    assert_eq!(checks.iter().filter(|c| c.void_flag).count(), 3);

    let after = svc.payment_file(run.id).await.unwrap();
    assert_ne!(before.digest, after.digest);
    assert_eq!(after.file_name, "PSCHECKS_2025_20251215_1.csv");
    assert!(svc
        .transfers()
        .auditor()
        .has_successful_transfer(run.id, &before.digest)
        .await
        .unwrap());
    assert!(!svc
        .transfers()
        .auditor()
        .has_successful_transfer(run.id, &after.digest)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_reprint_limit_fails_run() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;

    for _ in 0..2 {
        svc.reprint(run.id, "misprint", &actor).await.unwrap();
        svc.mark_printed(run.id, &actor).await.unwrap();
    }

    let err = svc.reprint(run.id, "misprint", &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::ReprintLimitExceeded { max: 2, .. }));
    assert!(!err.is_retryable());

    let stored = svc.get(run.id).await.unwrap();
    assert_eq!(stored.status, StepStatus::Failed);
    assert_eq!(stored.reprint_count, 2);
}

#[tokio::test]
async fn test_terminal_run_rejects_every_operation() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    svc.fail(run.id, "bank holiday", &actor).await.unwrap();

    let id = run.id;
    let results = [
        svc.calculate_balances(id, lines(), &actor).await.map(|_| ()),
        svc.number_checks(id, &actor).await.map(|_| ()),
        svc.mark_printed(id, &actor).await.map(|_| ()),
        svc.transfer(id, &Accepting, &actor).await.map(|_| ()),
        svc.reprint(id, "again", &actor).await.map(|_| ()),
        svc.confirm(id, &actor).await.map(|_| ()),
        svc.fail(id, "again", &actor).await.map(|_| ()),
    ];
    for result in results {
        assert!(matches!(result, Err(CheckRunError::IrreversibleState { .. })));
    }
    assert!(svc.locks.lock().await.is_empty());
}

#[tokio::test]
async fn test_run_locks_released_once_terminal() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    assert!(svc.locks.lock().await.contains_key(&run.id));

    svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    svc.confirm(run.id, &actor).await.unwrap();
    assert!(svc.locks.lock().await.is_empty());
}

#[tokio::test]
async fn test_interrupted_reprint_is_renumbered() {
    let mut storage = Storage::in_memory();
    storage.checks = Arc::new(FailingSecondBatch::default());
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;

    let err = svc.reprint(run.id, "printer jam", &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Storage(StorageError::Corrupt { .. })));

    let stored = svc.get(run.id).await.unwrap();
    assert_eq!(stored.step, CheckRunStep::ChecksNumbered);
    assert_eq!(stored.reprint_count, 1);
    assert!(stored.awaiting_check_block());
    assert!(svc.checks(run.id).await.unwrap().iter().all(|c| c.void_flag));

    assert!(matches!(
        svc.transfer(run.id, &Accepting, &actor).await,
        Err(CheckRunError::NotAllowed { .. })
    ));
    assert!(matches!(
        svc.mark_printed(run.id, &actor).await,
        Err(CheckRunError::Validation { .. })
    ));

    let reissued = svc.number_checks(run.id, &actor).await.unwrap();
    let replaced: Vec<Option<i64>> = reissued.iter().map(|c| c.replace_check).collect();
    assert_eq!(replaced, vec![Some(1), Some(2), Some(3)]);
    assert!(matches!(
        svc.number_checks(run.id, &actor).await,
        Err(CheckRunError::NotAllowed { .. })
    ));

    svc.mark_printed(run.id, &actor).await.unwrap();
    svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    let run = svc.confirm(run.id, &actor).await.unwrap();
    assert_eq!(run.step, CheckRunStep::Confirmed);
    let live = svc.checks(run.id).await.unwrap().into_iter().filter(ProfitShareCheck::is_live).count();
    assert_eq!(live, 3);
}

#[tokio::test]
async fn test_transfer_refuses_file_without_live_checks() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    for check in svc.checks(run.id).await.unwrap() {
        svc.issuer().void(check.id, date(), &actor).await.unwrap();
    }

    let err = svc.transfer(run.id, &Accepting, &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Validation { .. }));
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Printed);
    assert!(svc.transfers().auditor().attempts(run.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_refuses_file_without_live_checks() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    for check in svc.checks(run.id).await.unwrap() {
        svc.issuer().void(check.id, date(), &actor).await.unwrap();
    }

    let err = svc.confirm(run.id, &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Validation { .. }));
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Transferred);
}

#[tokio::test]
async fn test_lost_audit_leaves_run_pending() {
    let mut storage = Storage::in_memory();
    storage.transfers = Arc::new(LosingAudits::default());
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;

    let outcome = svc.transfer(run.id, &Accepting, &actor).await.unwrap();
    assert!(outcome.audit.is_none());
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Transferred);

    let err = svc
        .await_confirmation(run.id, Duration::from_millis(30), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckRunError::Pending { .. }));
    assert_eq!(svc.get(run.id).await.unwrap().step, CheckRunStep::Transferred);
}

#[tokio::test]
async fn test_await_confirmation_returns_once_confirmed() {
    let storage = Storage::in_memory();
    let svc = service_with(&storage, config());
    let actor = Actor::system();
    let run = printed_run(&svc, &actor).await;
    svc.transfer(run.id, &Accepting, &actor).await.unwrap();

    let run = svc
        .await_confirmation(run.id, Duration::from_secs(1), &actor)
        .await
        .unwrap();
    assert_eq!(run.step, CheckRunStep::Confirmed);
}

#[tokio::test]
async fn test_same_day_reprint_rule() {
    let storage = Storage::in_memory();
    let svc = service_with(
        &storage,
        CheckRunConfig {
            same_day_reprint_only: true,
            ..config()
        },
    );
    let actor = Actor::system();
    // Run dated in the past.
    let run = printed_run(&svc, &actor).await;

    let err = svc.reprint(run.id, "late", &actor).await.unwrap_err();
    assert!(matches!(err, CheckRunError::Validation { .. }));
    let stored = svc.get(run.id).await.unwrap();
    assert_eq!(stored.step, CheckRunStep::Printed);
    assert_eq!(stored.reprint_count, 0);
}

#[tokio::test]
async fn test_concurrent_transitions_serialize() {
    let storage = Storage::in_memory();
    let svc = Arc::new(service_with(&storage, config()));
    let actor = Actor::system();
    let run = svc.start_run(2025, date(), &actor).await.unwrap();
    svc.calculate_balances(run.id, lines(), &actor).await.unwrap();
    svc.number_checks(run.id, &actor).await.unwrap();

    let id = run.id;
    let mut handles = Vec::new();
    for _ in 0..4 {
        let svc = svc.clone();
        let actor = actor.clone();
        handles.push(tokio::spawn(async move { svc.mark_printed(id, &actor).await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(CheckRunError::NotAllowed { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(svc.get(run.id).await.unwrap().version, 4);
}
