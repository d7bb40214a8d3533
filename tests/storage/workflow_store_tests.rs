//! WorkflowStore interface tests.

use chrono::NaiveDate;
use profitshare::domain::{Actor, CheckPayee, CheckRunWorkflow, Ssn, StepStatus, TaxCode, Transition};
use profitshare::interfaces::{StorageError, WorkflowStore};
use rust_decimal_macros::dec;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
}

fn new_run(date: NaiveDate) -> CheckRunWorkflow {
    CheckRunWorkflow::new(2025, date, 2, &Actor::new("wf-test"))
}

pub async fn test_create_and_get<S: WorkflowStore + ?Sized>(store: &S) {
    let run = new_run(day(1));
    store.create(&run).await.expect("create should succeed");

    let fetched = store.get(run.id).await.unwrap().expect("run should exist");
    assert_eq!(fetched, run);
    assert_eq!(store.find_active(2025, day(1)).await.unwrap().map(|r| r.id), Some(run.id));
    assert!(store.get(uuid::Uuid::new_v4()).await.unwrap().is_none());
}

pub async fn test_one_active_run_per_date<S: WorkflowStore + ?Sized>(store: &S) {
    let mut first = new_run(day(2));
    store.create(&first).await.unwrap();

    let err = store.create(&new_run(day(2))).await.unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }), "got {err:?}");

    first
        .apply(Transition::Fail { reason: "abort".into() }, &Actor::new("wf-test"))
        .unwrap();
    store.update(&first, 0).await.unwrap();
    assert!(store.find_active(2025, day(2)).await.unwrap().is_none());

    let second = new_run(day(2));
    store.create(&second).await.expect("failed run frees the date");
    assert_eq!(store.find_active(2025, day(2)).await.unwrap().map(|r| r.id), Some(second.id));
}

pub async fn test_update_checks_version<S: WorkflowStore + ?Sized>(store: &S) {
    let actor = Actor::new("wf-test");
    let mut run = new_run(day(3));
    store.create(&run).await.unwrap();

    run.apply(Transition::Advance, &actor).unwrap();
    store.update(&run, 0).await.expect("update at expected version");

    let mut stale = run.clone();
    stale.apply(Transition::Advance, &actor).unwrap();
    let err = store.update(&stale, 0).await.unwrap_err();
    assert!(
        matches!(err, StorageError::VersionConflict { expected: 0, actual: 1, .. }),
        "got {err:?}"
    );

    let fetched = store.get(run.id).await.unwrap().unwrap();
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.step, run.step);
}

pub async fn test_terminal_row_rejects_update<S: WorkflowStore + ?Sized>(store: &S) {
    let actor = Actor::new("wf-test");
    let mut run = new_run(day(4));
    store.create(&run).await.unwrap();
    run.apply(Transition::Fail { reason: "bad".into() }, &actor).unwrap();
    store.update(&run, 0).await.unwrap();

    let stored = store.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, StepStatus::Failed);
    assert_eq!(stored.failure_reason.as_deref(), Some("bad"));

    let err = store.update(&run, 1).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidState { .. }), "got {err:?}");
}

pub async fn test_payees_replace<S: WorkflowStore + ?Sized>(store: &S) {
    let run = new_run(day(5));
    store.create(&run).await.unwrap();
    assert!(store.payees(run.id).await.unwrap().is_empty());

    let payee = |ssn: u32, id: i32| CheckPayee {
        ssn: Ssn::new(ssn).unwrap(),
        demographic_id: id,
        payable_name: format!("Payee {id}"),
        amount: dec!(10.50),
        tax_code: TaxCode::NORMAL_DISTRIBUTION,
        payment_sequence: Some(id),
    };
    store
        .replace_payees(run.id, &[payee(200_000_002, 2), payee(200_000_001, 1)])
        .await
        .unwrap();
    store.replace_payees(run.id, &[payee(200_000_003, 3), payee(200_000_001, 1)]).await.unwrap();

    let payees = store.payees(run.id).await.unwrap();
    assert_eq!(payees.iter().map(|p| p.demographic_id).collect::<Vec<_>>(), vec![3, 1]);
    assert_eq!(payees[0].amount, dec!(10.50));
}

pub async fn test_list_for_year<S: WorkflowStore + ?Sized>(store: &S) {
    let late = CheckRunWorkflow::new(2019, day(20), 2, &Actor::system());
    let early = CheckRunWorkflow::new(2019, day(10), 2, &Actor::system());
    store.create(&late).await.unwrap();
    store.create(&early).await.unwrap();

    let runs = store.list_for_year(2019).await.unwrap();
    assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![early.id, late.id]);
}

/// Run all WorkflowStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_workflow_store_tests {
    ($store:expr) => {
        use $crate::storage::workflow_store_tests::*;

        test_create_and_get($store).await;
        println!("  test_create_and_get: PASSED");

        test_one_active_run_per_date($store).await;
        println!("  test_one_active_run_per_date: PASSED");

        test_update_checks_version($store).await;
        println!("  test_update_checks_version: PASSED");

        test_terminal_row_rejects_update($store).await;
        println!("  test_terminal_row_rejects_update: PASSED");

        test_payees_replace($store).await;
        println!("  test_payees_replace: PASSED");

        test_list_for_year($store).await;
        println!("  test_list_for_year: PASSED");
    };
}
