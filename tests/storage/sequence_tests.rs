//! SequenceAllocator interface tests.

use futures::future::join_all;
use profitshare::domain::ssn::PLACEHOLDER_SSN_MIN;
use profitshare::interfaces::{Sequence, SequenceAllocator};

pub async fn test_blocks_are_contiguous<S: SequenceAllocator + ?Sized>(allocator: &S) {
    let first = allocator.next_block(Sequence::CheckNumber, 3).await.unwrap();
    let second = allocator.next_block(Sequence::CheckNumber, 2).await.unwrap();
    assert_eq!(first.end - first.start, 3);
    assert_eq!(second.start, first.end, "blocks should follow each other");
    assert_eq!(allocator.next_value(Sequence::CheckNumber).await.unwrap(), second.end);
}

pub async fn test_sequences_are_independent<S: SequenceAllocator + ?Sized>(allocator: &S) {
    let bank = allocator.next_value(Sequence::Bank).await.unwrap();
    let account = allocator.next_value(Sequence::BankAccount).await.unwrap();
    assert_eq!(bank, Sequence::Bank.start());
    assert_eq!(account, Sequence::BankAccount.start());
}

pub async fn test_placeholder_range<S: SequenceAllocator + ?Sized>(allocator: &S) {
    let ssn = allocator.next_value(Sequence::FakeSsn).await.unwrap();
    assert_eq!(ssn, PLACEHOLDER_SSN_MIN);
}

pub async fn test_concurrent_allocation_never_repeats<S: SequenceAllocator + ?Sized>(allocator: &S) {
    let blocks = join_all((0..10).map(|_| allocator.next_block(Sequence::PscCheckId, 4))).await;
    let mut values: Vec<i64> = blocks.into_iter().flat_map(|b| b.unwrap()).collect();
    let total = values.len();
    values.sort_unstable();
    values.dedup();
    assert_eq!(values.len(), total, "no value may be handed out twice");
    assert_eq!(total, 40);
}

/// Run all SequenceAllocator interface tests against an implementation.
#[macro_export]
macro_rules! run_sequence_tests {
    ($allocator:expr) => {
        use $crate::storage::sequence_tests::*;

        test_blocks_are_contiguous($allocator).await;
        println!("  test_blocks_are_contiguous: PASSED");

        test_sequences_are_independent($allocator).await;
        println!("  test_sequences_are_independent: PASSED");

        test_placeholder_range($allocator).await;
        println!("  test_placeholder_range: PASSED");

        test_concurrent_allocation_never_repeats($allocator).await;
        println!("  test_concurrent_allocation_never_repeats: PASSED");
    };
}
