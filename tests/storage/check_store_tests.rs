//! CheckStore interface tests.

use chrono::NaiveDate;
use profitshare::domain::{CheckAction, NewCheck, Ssn, TaxCode};
use profitshare::interfaces::{CheckStore, StorageError};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 15).unwrap()
}

fn new_check(run_id: Option<Uuid>, check_number: i64, psc_check_id: i64) -> NewCheck {
    NewCheck {
        check_number,
        psc_check_id,
        check_run_workflow_id: run_id,
        ssn: Ssn::new(300_000_000 + check_number as u32).unwrap(),
        demographic_id: check_number as i32,
        payable_name: format!("Payee {check_number}"),
        check_amount: dec!(99.95),
        tax_code: TaxCode::EARLY_DISTRIBUTION,
        check_date: date(),
        check_run_date: date(),
        manual_check: false,
        replace_check: None,
        other_beneficiary: false,
        user_name: "check-test".into(),
    }
}

pub async fn test_insert_batch_and_read<S: CheckStore + ?Sized>(store: &S) {
    let run_id = Uuid::new_v4();
    let inserted = store
        .insert_batch(vec![new_check(Some(run_id), 12, 112), new_check(Some(run_id), 11, 111)])
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.len(), 2);
    assert!(inserted.iter().all(|c| c.is_live()));

    let by_id = store.get(inserted[0].id).await.unwrap().expect("check should exist");
    assert_eq!(by_id, inserted[0]);
    let by_number = store.by_check_number(11).await.unwrap().expect("check should exist");
    assert_eq!(by_number.psc_check_id, 111);
    assert_eq!(by_number.check_amount, dec!(99.95));

    let listed = store.list_for_run(run_id).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.check_number).collect::<Vec<_>>(), vec![11, 12]);
    assert!(store.list_for_run(Uuid::new_v4()).await.unwrap().is_empty());
}

pub async fn test_duplicate_rejects_whole_batch<S: CheckStore + ?Sized>(store: &S) {
    store.insert_batch(vec![new_check(None, 21, 121)]).await.unwrap();

    let err = store
        .insert_batch(vec![new_check(None, 22, 122), new_check(None, 21, 123)])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }), "got {err:?}");
    assert!(store.by_check_number(22).await.unwrap().is_none(), "batch must be all or nothing");

    let err = store.insert_batch(vec![new_check(None, 24, 121)]).await.unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }), "psc check id collision, got {err:?}");
}

pub async fn test_void_is_one_way<S: CheckStore + ?Sized>(store: &S) {
    let check = store.insert_batch(vec![new_check(None, 31, 131)]).await.unwrap().remove(0);
    let day = NaiveDate::from_ymd_opt(2025, 12, 18).unwrap();

    let voided = store.apply(check.id, CheckAction::Void { on: day }).await.unwrap();
    assert!(voided.void_flag);
    assert_eq!(voided.void_check_date, Some(day));

    for action in [CheckAction::Void { on: day }, CheckAction::Clear { on: day, loaded: day }] {
        let err = store.apply(check.id, action).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidState { .. }), "got {err:?}");
    }

    let reconciled = store.apply(check.id, CheckAction::ReconcileVoid { on: day }).await.unwrap();
    assert_eq!(reconciled.void_recon_date, Some(day));
    assert_eq!(store.get(check.id).await.unwrap().unwrap(), reconciled);
}

pub async fn test_clear<S: CheckStore + ?Sized>(store: &S) {
    let check = store.insert_batch(vec![new_check(None, 41, 141)]).await.unwrap().remove(0);
    let on = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    let loaded = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();

    let cleared = store.apply(check.id, CheckAction::Clear { on, loaded }).await.unwrap();
    assert_eq!(cleared.clear_date, Some(on));
    assert_eq!(cleared.clear_date_loaded, Some(loaded));
    assert!(!cleared.is_live());

    let err = store.apply(check.id, CheckAction::Void { on }).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidState { .. }), "got {err:?}");
}

pub async fn test_apply_missing<S: CheckStore + ?Sized>(store: &S) {
    let err = store
        .apply(999_999, CheckAction::Void { on: date() })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {err:?}");
}

/// Run all CheckStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_check_store_tests {
    ($store:expr) => {
        use $crate::storage::check_store_tests::*;

        test_insert_batch_and_read($store).await;
        println!("  test_insert_batch_and_read: PASSED");

        test_duplicate_rejects_whole_batch($store).await;
        println!("  test_duplicate_rejects_whole_batch: PASSED");

        test_void_is_one_way($store).await;
        println!("  test_void_is_one_way: PASSED");

        test_clear($store).await;
        println!("  test_clear: PASSED");

        test_apply_missing($store).await;
        println!("  test_apply_missing: PASSED");
    };
}
