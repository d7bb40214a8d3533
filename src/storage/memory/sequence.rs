use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::{Sequence, SequenceAllocator};

/// Lock-free counters; each holds the next value to hand out.
pub struct MemorySequenceAllocator {
    counters: HashMap<Sequence, AtomicI64>,
}

impl MemorySequenceAllocator {
    pub fn new() -> Self {
        Self {
            counters: Sequence::ALL
                .into_iter()
                .map(|seq| (seq, AtomicI64::new(seq.start())))
                .collect(),
        }
    }

    /// Start `sequence` at `next` instead of its default.
    pub fn with_start(self, sequence: Sequence, next: i64) -> Self {
        if let Some(counter) = self.counters.get(&sequence) {
            counter.store(next, Ordering::SeqCst);
        }
        self
    }
}

impl Default for MemorySequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SequenceAllocator for MemorySequenceAllocator {
    async fn next_block(&self, sequence: Sequence, count: u32) -> Result<Range<i64>> {
        let counter = self
            .counters
            .get(&sequence)
            .ok_or(StorageError::SequenceExhausted(sequence.name()))?;
        let start = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                sequence.block_from(next, count).ok().map(|block| block.end)
            })
            .map_err(|_| StorageError::SequenceExhausted(sequence.name()))?;
        sequence.block_from(start, count)
    }
}
