//! Social security number newtype.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower bound of the placeholder range handed out by `FAKE_SSN_SEQ`.
pub const PLACEHOLDER_SSN_MIN: i64 = 666_000_000;
/// Upper bound (inclusive) of the placeholder range.
pub const PLACEHOLDER_SSN_MAX: i64 = 666_999_999;

const SSN_MAX: u32 = 999_999_999;

/// A nine-digit SSN.
///
/// `Display` always masks to the last four digits so that the value can be
/// placed in log fields. Use [`Ssn::value`] when the raw number is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Ssn(u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SSN must be within 1..=999999999, got {0}")]
pub struct InvalidSsn(pub i64);

impl Ssn {
    pub fn new(value: u32) -> Result<Self, InvalidSsn> {
        if value == 0 || value > SSN_MAX {
            return Err(InvalidSsn(i64::from(value)));
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// `XXX-XX-1234`
    pub fn masked(self) -> String {
        format!("XXX-XX-{:04}", self.0 % 10_000)
    }

    /// True when the SSN lies in the range reserved for placeholders.
    pub fn is_placeholder(self) -> bool {
        (PLACEHOLDER_SSN_MIN..=PLACEHOLDER_SSN_MAX).contains(&i64::from(self.0))
    }
}

impl TryFrom<u32> for Ssn {
    type Error = InvalidSsn;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Ssn {
    type Error = InvalidSsn;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map_err(|_| InvalidSsn(value))
            .and_then(Self::new)
    }
}

impl From<Ssn> for u32 {
    fn from(ssn: Ssn) -> Self {
        ssn.0
    }
}

impl From<Ssn> for i64 {
    fn from(ssn: Ssn) -> Self {
        i64::from(ssn.0)
    }
}

impl fmt::Display for Ssn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
