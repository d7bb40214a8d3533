//! LedgerStore interface tests.
//!
//! These tests verify the contract of the LedgerStore trait.
//! Each storage implementation should run these tests.

use futures::future::join_all;
use profitshare::domain::{Actor, PostingEntry, PostingKind, ProfitCode, Ssn};
use profitshare::interfaces::{LedgerStore, StorageError};
use rust_decimal_macros::dec;

fn ssn(n: u32) -> Ssn {
    Ssn::new(n).unwrap()
}

fn actor() -> Actor {
    Actor::new("ledger-test")
}

// =============================================================================
// LedgerStore::append tests
// =============================================================================

pub async fn test_append_and_get<S: LedgerStore + ?Sized>(store: &S) {
    let entry = PostingEntry::new(ssn(100_000_001), 2024, ProfitCode::Incoming, 1)
        .with_contribution(dec!(1000.00))
        .with_earnings(dec!(52.10))
        .with_remark("YE 2024 allocation");

    let stored = store.append(entry.clone(), &actor()).await.expect("append should succeed");
    assert_eq!(stored.entry, entry);
    assert_eq!(stored.kind, PostingKind::Original);
    assert_eq!(stored.user_name, "ledger-test");

    let fetched = store
        .get(stored.id)
        .await
        .expect("get should succeed")
        .expect("posting should exist");
    assert_eq!(fetched, stored);
}

pub async fn test_duplicate_key_rejected<S: LedgerStore + ?Sized>(store: &S) {
    let entry = PostingEntry::new(ssn(100_000_002), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(10));
    store.append(entry.clone(), &actor()).await.unwrap();

    let err = store
        .append(entry.with_contribution(dec!(20)), &actor())
        .await
        .expect_err("second append of one key should fail");
    assert!(matches!(err, StorageError::Duplicate { .. }), "got {err:?}");

    // Same SSN and year, another code is a different key.
    store
        .append(
            PostingEntry::new(ssn(100_000_002), 2024, ProfitCode::PartialWithdrawal, 1).with_forfeiture(dec!(5)),
            &actor(),
        )
        .await
        .unwrap();
    let postings = store.postings(ssn(100_000_002), None).await.unwrap();
    assert_eq!(postings.len(), 2);
}

pub async fn test_concurrent_append_one_key<S: LedgerStore + ?Sized>(store: &S) {
    let entry = PostingEntry::new(ssn(100_000_008), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(75));
    let actor = actor();
    let results = join_all((0..2).map(|_| store.append(entry.clone(), &actor))).await;

    let stored = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(StorageError::Duplicate { .. })))
        .count();
    assert_eq!((stored, duplicates), (1, 1), "got {results:?}");
    assert_eq!(store.postings(ssn(100_000_008), None).await.unwrap().len(), 1);
}

pub async fn test_get_nonexistent<S: LedgerStore + ?Sized>(store: &S) {
    assert!(store.get(987_654).await.unwrap().is_none());
}

// =============================================================================
// LedgerStore::append_reversal tests
// =============================================================================

pub async fn test_reversal_takes_next_sequence<S: LedgerStore + ?Sized>(store: &S) {
    let original = store
        .append(
            PostingEntry::new(ssn(100_000_003), 2024, ProfitCode::Incoming, 1)
                .with_contribution(dec!(300.00))
                .with_service_credit(1),
            &actor(),
        )
        .await
        .unwrap();
    store
        .append(
            PostingEntry::new(ssn(100_000_003), 2024, ProfitCode::Incoming, 2).with_earnings(dec!(12.00)),
            &actor(),
        )
        .await
        .unwrap();

    let reversal = store
        .append_reversal(original.id, "keyed twice", &actor())
        .await
        .expect("reversal should succeed");
    assert_eq!(reversal.entry.distribution_sequence, 3);
    assert_eq!(reversal.entry.contribution, dec!(-300.00));
    assert_eq!(reversal.entry.years_of_service_credit, -1);
    assert_eq!(reversal.reversal_of(), Some(original.id));
}

pub async fn test_second_reversal_rejected<S: LedgerStore + ?Sized>(store: &S) {
    let original = store
        .append(
            PostingEntry::new(ssn(100_000_004), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(1)),
            &actor(),
        )
        .await
        .unwrap();
    let reversal = store.append_reversal(original.id, "first", &actor()).await.unwrap();

    let err = store.append_reversal(original.id, "second", &actor()).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyReversed(id) if id == original.id), "got {err:?}");

    let err = store.append_reversal(reversal.id, "undo", &actor()).await.unwrap_err();
    assert!(matches!(err, StorageError::ReversalOfReversal(id) if id == reversal.id), "got {err:?}");
}

pub async fn test_reversal_at_last_sequence<S: LedgerStore + ?Sized>(store: &S) {
    let original = store
        .append(
            PostingEntry::new(ssn(100_000_009), 2024, ProfitCode::Incoming, i32::MAX).with_contribution(dec!(9)),
            &actor(),
        )
        .await
        .unwrap();

    let err = store.append_reversal(original.id, "keyed twice", &actor()).await.unwrap_err();
    assert!(
        matches!(err, StorageError::SequenceExhausted("distribution_sequence")),
        "got {err:?}"
    );
    assert_eq!(store.postings(ssn(100_000_009), None).await.unwrap().len(), 1);
}

pub async fn test_reverse_missing<S: LedgerStore + ?Sized>(store: &S) {
    let err = store.append_reversal(876_543, "missing", &actor()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {err:?}");
}

// =============================================================================
// LedgerStore::postings tests
// =============================================================================

pub async fn test_postings_through_year<S: LedgerStore + ?Sized>(store: &S) {
    let who = ssn(100_000_005);
    for year in [2022, 2023, 2024] {
        store
            .append(
                PostingEntry::new(who, year, ProfitCode::Incoming, 1).with_contribution(dec!(100)),
                &actor(),
            )
            .await
            .unwrap();
    }

    let all = store.postings(who, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id), "postings should be in id order");

    let through = store.postings(who, Some(2023)).await.unwrap();
    assert_eq!(
        through.iter().map(|p| p.entry.profit_year).collect::<Vec<_>>(),
        vec![2022, 2023]
    );
}

pub async fn test_ssn_isolation<S: LedgerStore + ?Sized>(store: &S) {
    store
        .append(
            PostingEntry::new(ssn(100_000_006), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(1)),
            &actor(),
        )
        .await
        .unwrap();
    assert!(store.postings(ssn(100_000_007), None).await.unwrap().is_empty());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all LedgerStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_ledger_store_tests {
    ($store:expr) => {
        use $crate::storage::ledger_store_tests::*;

        test_append_and_get($store).await;
        println!("  test_append_and_get: PASSED");

        test_duplicate_key_rejected($store).await;
        println!("  test_duplicate_key_rejected: PASSED");

        test_concurrent_append_one_key($store).await;
        println!("  test_concurrent_append_one_key: PASSED");

        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        test_reversal_takes_next_sequence($store).await;
        println!("  test_reversal_takes_next_sequence: PASSED");

        test_second_reversal_rejected($store).await;
        println!("  test_second_reversal_rejected: PASSED");

        test_reversal_at_last_sequence($store).await;
        println!("  test_reversal_at_last_sequence: PASSED");

        test_reverse_missing($store).await;
        println!("  test_reverse_missing: PASSED");

        test_postings_through_year($store).await;
        println!("  test_postings_through_year: PASSED");

        test_ssn_isolation($store).await;
        println!("  test_ssn_isolation: PASSED");
    };
}
