//! Vesting schedules.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const OLD_PLAN_ID: i32 = 1;
pub const NEW_PLAN_ID: i32 = 2;

/// One row of a schedule: at `years_of_service` completed years the
/// participant is `vested_percent` vested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingStep {
    pub years_of_service: u32,
    pub vested_percent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effective_date: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
    pub steps: Vec<VestingStep>,
}

fn default_active() -> bool {
    true
}

/// Reason a schedule was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleDefect {
    #[error("schedule has no steps")]
    Empty,
    #[error("years of service must strictly increase (step {index})")]
    YearsNotIncreasing { index: usize },
    #[error("vested percent decreases at step {index}")]
    PercentDecreasing { index: usize },
    #[error("vested percent {percent} at step {index} outside [0, 100]")]
    PercentOutOfRange { index: usize, percent: Decimal },
    #[error("final step is {percent}%, must be 100%")]
    NotFullyVesting { percent: Decimal },
}

impl VestingSchedule {
    /// Check the structural invariants every schedule must hold.
    pub fn validate(&self) -> Result<(), ScheduleDefect> {
        let hundred = Decimal::ONE_HUNDRED;
        let Some(last) = self.steps.last() else {
            return Err(ScheduleDefect::Empty);
        };

        for (index, step) in self.steps.iter().enumerate() {
            if step.vested_percent < Decimal::ZERO || step.vested_percent > hundred {
                return Err(ScheduleDefect::PercentOutOfRange {
                    index,
                    percent: step.vested_percent,
                });
            }
            if index == 0 {
                continue;
            }
            let prev = &self.steps[index - 1];
            if step.years_of_service <= prev.years_of_service {
                return Err(ScheduleDefect::YearsNotIncreasing { index });
            }
            if step.vested_percent < prev.vested_percent {
                return Err(ScheduleDefect::PercentDecreasing { index });
            }
        }

        if last.vested_percent != hundred {
            return Err(ScheduleDefect::NotFullyVesting {
                percent: last.vested_percent,
            });
        }
        Ok(())
    }

    /// Percent for `years` completed years of service.
    ///
    /// The greatest step at or below `years` wins. Below the first step the
    /// participant is 0% vested; beyond the table the last percent applies.
    pub fn percent_for(&self, years: u32) -> Decimal {
        self.steps
            .iter()
            .take_while(|step| step.years_of_service <= years)
            .last()
            .map(|step| step.vested_percent.min(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    }

    /// Smallest years of service at which the schedule reaches 100%.
    pub fn full_vesting_year(&self) -> Option<u32> {
        self.steps
            .iter()
            .find(|step| step.vested_percent >= Decimal::ONE_HUNDRED)
            .map(|step| step.years_of_service)
    }

    fn seeded(id: i32, name: &str, description: &str, effective_date: NaiveDate, percents: &[u32]) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            effective_date,
            active: true,
            steps: percents
                .iter()
                .enumerate()
                .map(|(years, pct)| VestingStep {
                    years_of_service: years as u32,
                    vested_percent: Decimal::from(*pct),
                })
                .collect(),
        }
    }

    /// Schedule 1: participants enrolled before 2007.
    pub fn old_plan() -> Self {
        Self::seeded(
            OLD_PLAN_ID,
            "Old Plan (Pre-2007)",
            "Original 7-year vesting schedule for employees hired before 2007",
            NaiveDate::from_ymd_opt(1917, 1, 1).unwrap_or_default(),
            &[0, 0, 0, 20, 40, 60, 80, 100],
        )
    }

    /// Schedule 2: participants enrolled in 2007 or later.
    pub fn new_plan() -> Self {
        Self::seeded(
            NEW_PLAN_ID,
            "New Plan (2007+)",
            "New 6-year vesting schedule for employees hired 2007 and later",
            NaiveDate::from_ymd_opt(2007, 1, 1).unwrap_or_default(),
            &[0, 0, 20, 40, 60, 80, 100],
        )
    }
}
