//! Vesting schedule registry.
//!
//! Holds the validated schedules and answers (schedule id, years of
//! service) → vested percent.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::vesting::ScheduleDefect;
use crate::domain::VestingSchedule;

/// Result type for vesting operations.
pub type Result<T> = std::result::Result<T, VestingError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VestingError {
    #[error("Vesting schedule {0} not found")]
    ScheduleNotFound(i32),

    #[error("Vesting schedule {id} ({name}) is invalid: {defect}")]
    InvalidSchedule {
        id: i32,
        name: String,
        #[source]
        defect: ScheduleDefect,
    },

    #[error("Vesting schedule name {0} is used twice")]
    DuplicateName(String),
}

/// Validated schedules keyed by id.
#[derive(Debug, Clone)]
pub struct VestingScheduleRegistry {
    schedules: BTreeMap<i32, VestingSchedule>,
}

impl VestingScheduleRegistry {
    /// Build a registry, rejecting any schedule that fails validation.
    ///
    /// A later schedule with an id already present replaces the earlier one.
    pub fn new(schedules: impl IntoIterator<Item = VestingSchedule>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for schedule in schedules {
            schedule.validate().map_err(|defect| VestingError::InvalidSchedule {
                id: schedule.id,
                name: schedule.name.clone(),
                defect,
            })?;
            by_id.insert(schedule.id, schedule);
        }

        let mut names = std::collections::HashSet::new();
        for schedule in by_id.values() {
            if !names.insert(schedule.name.as_str()) {
                return Err(VestingError::DuplicateName(schedule.name.clone()));
            }
        }

        Ok(Self { schedules: by_id })
    }

    /// The Old Plan and New Plan schedules.
    pub fn seeded() -> Self {
        let schedules = [VestingSchedule::old_plan(), VestingSchedule::new_plan()]
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        Self { schedules }
    }

    pub fn get(&self, id: i32) -> Result<&VestingSchedule> {
        self.schedules.get(&id).ok_or(VestingError::ScheduleNotFound(id))
    }

    /// Vested percent for `years` completed years under schedule `id`.
    pub fn resolve(&self, id: i32, years: u32) -> Result<Decimal> {
        Ok(self.get(id)?.percent_for(years))
    }

    pub fn iter(&self) -> impl Iterator<Item = &VestingSchedule> {
        self.schedules.values()
    }
}

impl Default for VestingScheduleRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}
