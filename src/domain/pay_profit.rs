use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProfitYear;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryType {
    Employee,
    Beneficiary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeType {
    NotNewLastYear,
    NewLastYear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enrollment {
    NotEnrolled,
    OldVestingPlanHasContributions,
    NewVestingPlanHasContributions,
    OldVestingPlanHasForfeitureRecords,
    NewVestingPlanHasForfeitureRecords,
}

impl Enrollment {
    /// Once the non-vested part has been forfeited, the rest is fully vested.
    pub const fn has_forfeited(self) -> bool {
        matches!(
            self,
            Self::OldVestingPlanHasForfeitureRecords | Self::NewVestingPlanHasForfeitureRecords
        )
    }
}

/// Per-year participation record of one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayProfit {
    pub demographic_id: i32,
    pub profit_year: ProfitYear,
    pub current_hours: Decimal,
    pub current_income: Decimal,
    #[serde(default)]
    pub executive_hours: Decimal,
    #[serde(default)]
    pub executive_income: Decimal,
    pub vesting_schedule_id: i32,
    pub enrollment: Enrollment,
    pub beneficiary_type: BeneficiaryType,
    pub employee_type: EmployeeType,
    #[serde(default)]
    pub zero_contribution_reason: Option<u8>,
}

impl PayProfit {
    pub fn total_hours(&self) -> Decimal {
        self.current_hours + self.executive_hours
    }

    pub fn total_income(&self) -> Decimal {
        self.current_income + self.executive_income
    }
}
