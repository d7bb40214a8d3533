//! Zero-contribution reasons and the vesting overrides they carry.
//!
//! The table is data: each reason maps to a [`ReasonEffect`] that the
//! vesting calculator evaluates before consulting the schedule.

use serde::{Deserialize, Serialize};

pub const NORMAL: u8 = 0;
pub const UNDER_21_OVER_1000_HOURS: u8 = 1;
pub const TERMINATED_OVER_1000_HOURS: u8 = 2;
pub const AGE_65_FIVE_YEARS: u8 = 6;
pub const AGE_64_FIVE_YEARS: u8 = 7;
pub const UNKNOWN: u8 = 8;

/// What a reason does to the vesting computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonEffect {
    /// Informational only.
    None,
    /// Adds one year to years of service.
    ExtraServiceYear,
    /// Forces 100% vesting.
    FullVesting,
    /// Forces 100% vesting once the 65th birthday is on or before the as-of
    /// date.
    FullVestingAt65,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroContributionReason {
    pub id: u8,
    pub name: String,
    pub effect: ReasonEffect,
}

impl ZeroContributionReason {
    fn seeded(id: u8, name: &str, effect: ReasonEffect) -> Self {
        Self {
            id,
            name: name.to_string(),
            effect,
        }
    }
}

/// Lookup table of zero-contribution reasons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZeroContributionReasonTable {
    reasons: Vec<ZeroContributionReason>,
}

impl ZeroContributionReasonTable {
    pub fn new(mut reasons: Vec<ZeroContributionReason>) -> Self {
        reasons.sort_by_key(|r| r.id);
        reasons.dedup_by_key(|r| r.id);
        Self { reasons }
    }

    /// Plan-standard reasons 0 through 8.
    pub fn seeded() -> Self {
        use ReasonEffect::*;
        Self::new(vec![
            ZeroContributionReason::seeded(NORMAL, "Normal", None),
            ZeroContributionReason::seeded(UNDER_21_OVER_1000_HOURS, "18,19,OR 20 WITH >1000 HOURS", None),
            ZeroContributionReason::seeded(
                TERMINATED_OVER_1000_HOURS,
                "TERMINATED EMPLOYEE >1000 HOURS WORKED GETS YEAR VESTED",
                ExtraServiceYear,
            ),
            ZeroContributionReason::seeded(3, "Over 64 and < 1000 hours gets 1 year vesting (obsolete 11/20)", None),
            ZeroContributionReason::seeded(4, "Over 64 and < 1000 hours gets 2 year vesting (obsolete 11/20)", None),
            ZeroContributionReason::seeded(5, "Over 64 and > 1000 hours gets 3 year vesting (obsolete 11/20)", None),
            ZeroContributionReason::seeded(
                AGE_65_FIVE_YEARS,
                ">=65 AND 1st CONTRIBUTION >=5 YEARS AGO GETS 100% VESTED",
                FullVesting,
            ),
            ZeroContributionReason::seeded(
                AGE_64_FIVE_YEARS,
                "=64 AND 1ST CONTRIBUTION >=5 YEARS AGO GETS 100% VESTED ON THEIR BIRTHDAY",
                FullVestingAt65,
            ),
            ZeroContributionReason::seeded(UNKNOWN, "Unknown", None),
        ])
    }

    pub fn get(&self, id: u8) -> Option<&ZeroContributionReason> {
        self.reasons
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.reasons[idx])
    }

    /// Effect for `id`; unknown ids are informational.
    pub fn effect(&self, id: u8) -> ReasonEffect {
        self.get(id).map(|r| r.effect).unwrap_or(ReasonEffect::None)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZeroContributionReason> {
        self.reasons.iter()
    }
}

impl Default for ZeroContributionReasonTable {
    fn default() -> Self {
        Self::seeded()
    }
}
