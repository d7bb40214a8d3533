//! Vested balance computation.
//!
//! Combines a participant's employment dates, their PayProfit row, the
//! ledger and the schedule registry. Zero-contribution overrides are
//! evaluated before the schedule is consulted.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::ledger::{LedgerError, ProfitLedger};
use super::vesting::{VestingError, VestingScheduleRegistry};
use crate::domain::zero_contribution::{
    AGE_64_FIVE_YEARS, AGE_65_FIVE_YEARS, NORMAL, TERMINATED_OVER_1000_HOURS, UNDER_21_OVER_1000_HOURS,
};
use crate::domain::{
    round_cents, BeneficiaryType, Demographic, EmploymentStatus, PayProfit, ProfitYear, ReasonEffect, Ssn,
    ZeroContributionReasonTable,
};

const MINIMUM_AGE_FOR_VESTING: u32 = 18;
const MINIMUM_AGE_FOR_CONTRIBUTION: u32 = 21;
const RETIREMENT_AGE: u32 = 65;
const VESTING_YEARS: i32 = 5;

/// Result type for vesting calculations.
pub type Result<T> = std::result::Result<T, CalculationError>;

#[derive(Debug, thiserror::Error)]
pub enum CalculationError {
    #[error("PayProfit row belongs to demographic {pay_profit}, not {demographic}")]
    Mismatch { demographic: i32, pay_profit: i32 },

    #[error(transparent)]
    Vesting(#[from] VestingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Why a participant got the percent they got.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum VestingBasis {
    Schedule { schedule_id: i32 },
    ReasonOverride { reason: u8 },
    ForfeitureEnrollment,
    BeneficiaryOnly,
    Deceased,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VestingResult {
    pub ssn: Ssn,
    pub profit_year: ProfitYear,
    pub as_of: NaiveDate,
    pub years_of_service: u32,
    pub zero_contribution_reason: Option<u8>,
    pub basis: VestingBasis,
    pub vested_percent: Decimal,
    /// Signed ledger total through the profit year.
    pub balance: Decimal,
    pub etva: Decimal,
    pub distributions: Decimal,
    pub vested_balance: Decimal,
}

/// Inputs of the year-end zero-contribution classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReasonInputs {
    pub age: u32,
    pub total_hours: Decimal,
    pub terminated: bool,
    /// Years since the first contribution, plus one when the prior year
    /// closed with a positive balance.
    pub years_since_first: i32,
}

/// Classify a participant into a zero-contribution reason.
pub fn derive_reason(inputs: ReasonInputs) -> u8 {
    let has_min_hours = inputs.total_hours >= Decimal::from(1000);
    let eligible = (inputs.age >= MINIMUM_AGE_FOR_VESTING && has_min_hours) || inputs.age >= RETIREMENT_AGE - 1;
    if !eligible {
        return NORMAL;
    }
    if inputs.age < MINIMUM_AGE_FOR_CONTRIBUTION {
        return UNDER_21_OVER_1000_HOURS;
    }

    let age_rule = if inputs.age >= RETIREMENT_AGE && inputs.years_since_first >= VESTING_YEARS {
        Some(AGE_65_FIVE_YEARS)
    } else if (inputs.age >= RETIREMENT_AGE && inputs.years_since_first == VESTING_YEARS - 1)
        || (inputs.age == RETIREMENT_AGE - 1 && inputs.years_since_first >= VESTING_YEARS - 1)
    {
        Some(AGE_64_FIVE_YEARS)
    } else {
        None
    };

    match (age_rule, inputs.terminated) {
        (Some(reason), _) => reason,
        (None, true) if has_min_hours => TERMINATED_OVER_1000_HOURS,
        _ => NORMAL,
    }
}

#[derive(Clone)]
pub struct VestingCalculator {
    ledger: ProfitLedger,
    schedules: Arc<VestingScheduleRegistry>,
    reasons: Arc<ZeroContributionReasonTable>,
}

impl VestingCalculator {
    pub fn new(
        ledger: ProfitLedger,
        schedules: Arc<VestingScheduleRegistry>,
        reasons: Arc<ZeroContributionReasonTable>,
    ) -> Self {
        Self {
            ledger,
            schedules,
            reasons,
        }
    }

    /// Vested percent and balance of `demographic` for the PayProfit year.
    pub async fn calculate(
        &self,
        demographic: &Demographic,
        pay_profit: &PayProfit,
        as_of: NaiveDate,
    ) -> Result<VestingResult> {
        if demographic.id != pay_profit.demographic_id {
            return Err(CalculationError::Mismatch {
                demographic: demographic.id,
                pay_profit: pay_profit.demographic_id,
            });
        }

        let ssn = demographic.ssn;
        let profit_year = pay_profit.profit_year;
        let schedule = self.schedules.get(pay_profit.vesting_schedule_id)?;
        let ledger = self.ledger.cumulative_balance(ssn, profit_year).await?;

        let reason = match pay_profit.zero_contribution_reason {
            Some(stored) => Some(stored),
            None => {
                let derived = derive_reason(self.reason_inputs(demographic, pay_profit, as_of).await?);
                (derived != NORMAL).then_some(derived)
            }
        };

        let mut years_of_service = demographic.dates.years_of_service(as_of);
        let mut forced = None;
        if let Some(reason) = reason {
            match self.reasons.effect(reason) {
                ReasonEffect::None => {}
                ReasonEffect::ExtraServiceYear => years_of_service += 1,
                ReasonEffect::FullVesting => forced = Some(VestingBasis::ReasonOverride { reason }),
                ReasonEffect::FullVestingAt65 => {
                    let reached = demographic.dates.sixty_fifth_birthday().is_some_and(|d| d <= as_of);
                    if reached {
                        forced = Some(VestingBasis::ReasonOverride { reason });
                    }
                }
            }
        }

        let forced = forced.or_else(|| {
            if demographic.is_deceased(as_of) {
                Some(VestingBasis::Deceased)
            } else if pay_profit.beneficiary_type == BeneficiaryType::Beneficiary {
                Some(VestingBasis::BeneficiaryOnly)
            } else if pay_profit.enrollment.has_forfeited() {
                Some(VestingBasis::ForfeitureEnrollment)
            } else {
                None
            }
        });

        let (basis, vested_percent) = match forced {
            Some(basis) => (basis, Decimal::ONE_HUNDRED),
            None => (
                VestingBasis::Schedule {
                    schedule_id: schedule.id,
                },
                schedule.percent_for(years_of_service),
            ),
        };

        let balance = ledger.total();
        let etva = ledger.etva();
        let distributions = ledger.distributions();
        let vested_balance = vested_amount(balance, etva, distributions, vested_percent);

        debug!(
            ssn = %ssn,
            profit_year,
            years_of_service,
            vested_percent = %vested_percent,
            vested_balance = %vested_balance,
            "Calculated vesting"
        );

        Ok(VestingResult {
            ssn,
            profit_year,
            as_of,
            years_of_service,
            zero_contribution_reason: reason,
            basis,
            vested_percent,
            balance,
            etva,
            distributions,
            vested_balance,
        })
    }

    async fn reason_inputs(&self, demographic: &Demographic, pay_profit: &PayProfit, as_of: NaiveDate) -> Result<ReasonInputs> {
        let profit_year = pay_profit.profit_year;
        let first_year = self.ledger.first_contribution_year(demographic.ssn, profit_year).await?;
        let years_since_first = match first_year {
            None => 0,
            Some(first) => {
                let prior = self.ledger.cumulative_balance(demographic.ssn, profit_year - 1).await?;
                let carried = i32::from(prior.total() > Decimal::ZERO);
                i32::from(profit_year) - i32::from(first) + carried
            }
        };
        let terminated = demographic.employment_status == EmploymentStatus::Terminated
            && demographic.dates.termination.is_some_and(|t| t < as_of);

        Ok(ReasonInputs {
            age: demographic.dates.age_on(as_of),
            total_hours: pay_profit.total_hours(),
            terminated,
            years_since_first,
        })
    }
}

/// `(balance + distributions − etva) × pct + etva − distributions`, in cents.
pub fn vested_amount(balance: Decimal, etva: Decimal, distributions: Decimal, percent: Decimal) -> Decimal {
    let ratio = percent / Decimal::ONE_HUNDRED;
    round_cents((balance + distributions - etva) * ratio + etva - distributions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vesting::NEW_PLAN_ID;
    use crate::domain::{
        Actor, EmployeeType, EmploymentDates, Enrollment, PersonName, PostingEntry, ProfitCode,
    };
    use crate::storage::MemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ssn() -> Ssn {
        Ssn::new(123_456_789).unwrap()
    }

    fn participant(birth: NaiveDate, hire: NaiveDate) -> Demographic {
        Demographic {
            id: 7,
            ssn: ssn(),
            badge_number: 700,
            oracle_hcm_id: None,
            name: PersonName {
                first: "Ada".into(),
                middle: None,
                last: "Lovelace".into(),
            },
            dates: EmploymentDates {
                birth,
                hire,
                rehire: None,
                termination: None,
                death: None,
            },
            termination_code: None,
            pay_classification_id: "1".into(),
            employment_status: EmploymentStatus::Active,
        }
    }

    fn pay_profit(year: ProfitYear) -> PayProfit {
        PayProfit {
            demographic_id: 7,
            profit_year: year,
            current_hours: dec!(2080),
            current_income: dec!(52000),
            executive_hours: Decimal::ZERO,
            executive_income: Decimal::ZERO,
            vesting_schedule_id: NEW_PLAN_ID,
            enrollment: Enrollment::NewVestingPlanHasContributions,
            beneficiary_type: BeneficiaryType::Employee,
            employee_type: EmployeeType::NotNewLastYear,
            zero_contribution_reason: None,
        }
    }

    async fn calculator_with(postings: Vec<PostingEntry>) -> VestingCalculator {
        let ledger = ProfitLedger::new(Arc::new(MemoryLedgerStore::new()));
        for entry in postings {
            ledger.post(entry, &Actor::system()).await.unwrap();
        }
        VestingCalculator::new(
            ledger,
            Arc::new(VestingScheduleRegistry::seeded()),
            Arc::new(ZeroContributionReasonTable::seeded()),
        )
    }

    #[tokio::test]
    async fn test_four_years_new_plan_is_sixty_percent() {
        let calc = calculator_with(vec![PostingEntry::new(ssn(), 2024, ProfitCode::Incoming, 1)
            .with_contribution(dec!(1000))
            .with_earnings(dec!(200))])
        .await;
        let who = participant(date(1980, 5, 1), date(2020, 6, 1));

        let result = calc.calculate(&who, &pay_profit(2024), date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.years_of_service, 4);
        assert_eq!(result.vested_percent, dec!(60));
        assert_eq!(result.basis, VestingBasis::Schedule { schedule_id: NEW_PLAN_ID });
        assert_eq!(result.vested_balance, dec!(720.00));
    }

    #[tokio::test]
    async fn test_distributions_reduce_vested_amount() {
        let calc = calculator_with(vec![
            PostingEntry::new(ssn(), 2023, ProfitCode::Incoming, 1).with_contribution(dec!(1000)),
            PostingEntry::new(ssn(), 2024, ProfitCode::PartialWithdrawal, 1).with_forfeiture(dec!(100)),
        ])
        .await;
        let who = participant(date(1980, 5, 1), date(2020, 6, 1));

        let result = calc.calculate(&who, &pay_profit(2024), date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.balance, dec!(900));
        assert_eq!(result.distributions, dec!(100));
        // (900 + 100) * 0.6 - 100
        assert_eq!(result.vested_balance, dec!(500.00));
    }

    #[tokio::test]
    async fn test_age_65_override_precedes_schedule() {
        let calc = calculator_with(vec![
            PostingEntry::new(ssn(), 2017, ProfitCode::Incoming, 1).with_contribution(dec!(400)),
            PostingEntry::new(ssn(), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(600)),
        ])
        .await;
        // One year of service would vest 0% under the New Plan.
        let who = participant(date(1955, 1, 10), date(2023, 6, 1));

        let result = calc.calculate(&who, &pay_profit(2024), date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.zero_contribution_reason, Some(AGE_65_FIVE_YEARS));
        assert_eq!(result.basis, VestingBasis::ReasonOverride { reason: AGE_65_FIVE_YEARS });
        assert_eq!(result.vested_percent, dec!(100));
        assert_eq!(result.vested_balance, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_stored_reason_wins_and_adds_service_year() {
        let calc = calculator_with(vec![
            PostingEntry::new(ssn(), 2024, ProfitCode::Incoming, 1).with_contribution(dec!(1000)),
        ])
        .await;
        let who = participant(date(1980, 5, 1), date(2021, 6, 1));
        let mut row = pay_profit(2024);
        row.zero_contribution_reason = Some(TERMINATED_OVER_1000_HOURS);

        let result = calc.calculate(&who, &row, date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.years_of_service, 4);
        assert_eq!(result.vested_percent, dec!(60));
    }

    #[tokio::test]
    async fn test_age_64_reason_waits_for_birthday() {
        let calc = calculator_with(vec![]).await;
        let who = participant(date(1960, 9, 1), date(2022, 1, 1));
        let mut row = pay_profit(2025);
        row.zero_contribution_reason = Some(AGE_64_FIVE_YEARS);

        let before = calc.calculate(&who, &row, date(2025, 8, 31)).await.unwrap();
        assert_eq!(before.vested_percent, dec!(40));

        let after = calc.calculate(&who, &row, date(2025, 9, 1)).await.unwrap();
        assert_eq!(after.vested_percent, dec!(100));
    }

    #[tokio::test]
    async fn test_beneficiary_and_deceased_fully_vested() {
        let calc = calculator_with(vec![]).await;
        let mut who = participant(date(1980, 5, 1), date(2024, 6, 1));
        let mut row = pay_profit(2024);
        row.beneficiary_type = BeneficiaryType::Beneficiary;

        let result = calc.calculate(&who, &row, date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.basis, VestingBasis::BeneficiaryOnly);

        who.dates.death = Some(date(2024, 10, 1));
        let result = calc.calculate(&who, &pay_profit(2024), date(2024, 12, 31)).await.unwrap();
        assert_eq!(result.basis, VestingBasis::Deceased);
        assert_eq!(result.vested_percent, dec!(100));
    }

    #[tokio::test]
    async fn test_unknown_schedule_and_mismatch() {
        let calc = calculator_with(vec![]).await;
        let who = participant(date(1980, 5, 1), date(2020, 6, 1));

        let mut row = pay_profit(2024);
        row.vesting_schedule_id = 42;
        assert!(matches!(
            calc.calculate(&who, &row, date(2024, 12, 31)).await,
            Err(CalculationError::Vesting(VestingError::ScheduleNotFound(42)))
        ));

        let mut row = pay_profit(2024);
        row.demographic_id = 8;
        assert!(matches!(
            calc.calculate(&who, &row, date(2024, 12, 31)).await,
            Err(CalculationError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_derive_reason() {
        let base = ReasonInputs {
            age: 40,
            total_hours: dec!(1500),
            terminated: false,
            years_since_first: 10,
        };
        assert_eq!(derive_reason(base), NORMAL);
        assert_eq!(derive_reason(ReasonInputs { age: 19, ..base }), UNDER_21_OVER_1000_HOURS);
        assert_eq!(derive_reason(ReasonInputs { age: 19, total_hours: dec!(200), ..base }), NORMAL);
        assert_eq!(derive_reason(ReasonInputs { terminated: true, ..base }), TERMINATED_OVER_1000_HOURS);
        assert_eq!(derive_reason(ReasonInputs { age: 66, ..base }), AGE_65_FIVE_YEARS);
        assert_eq!(
            derive_reason(ReasonInputs {
                age: 66,
                years_since_first: 4,
                ..base
            }),
            AGE_64_FIVE_YEARS
        );
        assert_eq!(
            derive_reason(ReasonInputs {
                age: 64,
                total_hours: dec!(10),
                years_since_first: 4,
                ..base
            }),
            AGE_64_FIVE_YEARS
        );
    }

    #[test]
    fn test_vested_amount_rounds_to_cents() {
        assert_eq!(vested_amount(dec!(100.01), dec!(0), dec!(0), dec!(20)), dec!(20.00));
        assert_eq!(vested_amount(dec!(100.05), dec!(0), dec!(0), dec!(50)), dec!(50.03));
        assert_eq!(vested_amount(dec!(500), dec!(100), dec!(0), dec!(0)), dec!(100.00));
    }
}
