//! Monotonic counters.

use std::ops::Range;

use async_trait::async_trait;

use super::ledger_store::{Result, StorageError};
use crate::domain::ssn::{PLACEHOLDER_SSN_MAX, PLACEHOLDER_SSN_MIN};

/// Named counters shared across the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sequence {
    CheckNumber,
    PscCheckId,
    Bank,
    BankAccount,
    FakeSsn,
}

impl Sequence {
    pub const ALL: [Sequence; 5] = [
        Self::CheckNumber,
        Self::PscCheckId,
        Self::Bank,
        Self::BankAccount,
        Self::FakeSsn,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::CheckNumber => "PROFIT_SHARE_CHECK_NUMBER_SEQ",
            Self::PscCheckId => "PSC_CHECK_ID",
            Self::Bank => "BANK_SEQ",
            Self::BankAccount => "BANK_ACCOUNT_SEQ",
            Self::FakeSsn => "FAKE_SSN_SEQ",
        }
    }

    /// First value handed out.
    pub const fn start(self) -> i64 {
        match self {
            Self::FakeSsn => PLACEHOLDER_SSN_MIN,
            _ => 1,
        }
    }

    /// Last value that may be handed out.
    pub const fn max(self) -> i64 {
        match self {
            Self::FakeSsn => PLACEHOLDER_SSN_MAX,
            _ => i64::MAX,
        }
    }

    /// Check that `[next, next + count)` stays within bounds.
    pub fn block_from(self, next: i64, count: u32) -> Result<Range<i64>> {
        let end = next
            .checked_add(i64::from(count))
            .filter(|end| *end - 1 <= self.max())
            .ok_or(StorageError::SequenceExhausted(self.name()))?;
        Ok(next..end)
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Atomic allocation of contiguous value blocks.
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Reserve `count` consecutive values. No value is ever handed out twice.
    async fn next_block(&self, sequence: Sequence, count: u32) -> Result<Range<i64>>;

    /// Reserve a single value.
    async fn next_value(&self, sequence: Sequence) -> Result<i64> {
        Ok(self.next_block(sequence, 1).await?.start)
    }
}
