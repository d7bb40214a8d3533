//! Issued profit-sharing checks.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ssn::Ssn;
use super::tax_code::TaxCode;

/// A check ready to be stored; numbers are already allocated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCheck {
    pub check_number: i64,
    pub psc_check_id: i64,
    pub check_run_workflow_id: Option<Uuid>,
    pub ssn: Ssn,
    pub demographic_id: i32,
    pub payable_name: String,
    pub check_amount: Decimal,
    pub tax_code: TaxCode,
    pub check_date: NaiveDate,
    pub check_run_date: NaiveDate,
    pub manual_check: bool,
    pub replace_check: Option<i64>,
    pub other_beneficiary: bool,
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitShareCheck {
    pub id: i64,
    pub check_number: i64,
    pub psc_check_id: i64,
    pub check_run_workflow_id: Option<Uuid>,
    pub ssn: Ssn,
    pub demographic_id: i32,
    pub payable_name: String,
    pub check_amount: Decimal,
    pub tax_code: TaxCode,
    pub check_date: NaiveDate,
    pub check_run_date: NaiveDate,
    pub void_flag: bool,
    pub void_check_date: Option<NaiveDate>,
    pub void_recon_date: Option<NaiveDate>,
    pub clear_date: Option<NaiveDate>,
    pub clear_date_loaded: Option<NaiveDate>,
    pub manual_check: bool,
    pub replace_check: Option<i64>,
    pub other_beneficiary: bool,
    pub user_name: String,
}

/// Mutations a stored check accepts after issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckAction {
    Void { on: NaiveDate },
    ReconcileVoid { on: NaiveDate },
    Clear { on: NaiveDate, loaded: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckStateError {
    #[error("check {0} is already voided")]
    AlreadyVoided(i64),
    #[error("check {0} has cleared the bank")]
    AlreadyCleared(i64),
    #[error("check {0} is not voided")]
    NotVoided(i64),
    #[error("void of check {0} is already reconciled")]
    AlreadyReconciled(i64),
}

impl ProfitShareCheck {
    pub fn from_new(id: i64, check: NewCheck) -> Self {
        Self {
            id,
            check_number: check.check_number,
            psc_check_id: check.psc_check_id,
            check_run_workflow_id: check.check_run_workflow_id,
            ssn: check.ssn,
            demographic_id: check.demographic_id,
            payable_name: check.payable_name,
            check_amount: check.check_amount,
            tax_code: check.tax_code,
            check_date: check.check_date,
            check_run_date: check.check_run_date,
            void_flag: false,
            void_check_date: None,
            void_recon_date: None,
            clear_date: None,
            clear_date_loaded: None,
            manual_check: check.manual_check,
            replace_check: check.replace_check,
            other_beneficiary: check.other_beneficiary,
            user_name: check.user_name,
        }
    }

    /// Issued, not voided and not cleared.
    pub fn is_live(&self) -> bool {
        !self.void_flag && self.clear_date.is_none()
    }

    /// Apply `action`. Void is one-way; a voided check never clears.
    pub fn apply(&mut self, action: CheckAction) -> Result<(), CheckStateError> {
        match action {
            CheckAction::Void { on } => {
                if self.void_flag {
                    return Err(CheckStateError::AlreadyVoided(self.check_number));
                }
                if self.clear_date.is_some() {
                    return Err(CheckStateError::AlreadyCleared(self.check_number));
                }
                self.void_flag = true;
                self.void_check_date = Some(on);
            }
            CheckAction::ReconcileVoid { on } => {
                if !self.void_flag {
                    return Err(CheckStateError::NotVoided(self.check_number));
                }
                if self.void_recon_date.is_some() {
                    return Err(CheckStateError::AlreadyReconciled(self.check_number));
                }
                self.void_recon_date = Some(on);
            }
            CheckAction::Clear { on, loaded } => {
                if self.void_flag {
                    return Err(CheckStateError::AlreadyVoided(self.check_number));
                }
                if self.clear_date.is_some() {
                    return Err(CheckStateError::AlreadyCleared(self.check_number));
                }
                self.clear_date = Some(on);
                self.clear_date_loaded = Some(loaded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn check() -> ProfitShareCheck {
        let today = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        ProfitShareCheck::from_new(
            1,
            NewCheck {
                check_number: 100_001,
                psc_check_id: 1,
                check_run_workflow_id: None,
                ssn: Ssn::new(123_456_789).unwrap(),
                demographic_id: 1,
                payable_name: "Doe, Jane".into(),
                check_amount: dec!(10.00),
                tax_code: TaxCode::NORMAL_DISTRIBUTION,
                check_date: today,
                check_run_date: today,
                manual_check: false,
                replace_check: None,
                other_beneficiary: false,
                user_name: "tester".into(),
            },
        )
    }

    #[test]
    fn test_void_is_one_way() {
        let day = NaiveDate::from_ymd_opt(2025, 12, 16).unwrap();
        let mut c = check();
        c.apply(CheckAction::Void { on: day }).unwrap();
        assert!(!c.is_live());
        assert_eq!(c.apply(CheckAction::Void { on: day }), Err(CheckStateError::AlreadyVoided(100_001)));
        assert_eq!(
            c.apply(CheckAction::Clear { on: day, loaded: day }),
            Err(CheckStateError::AlreadyVoided(100_001))
        );
        c.apply(CheckAction::ReconcileVoid { on: day }).unwrap();
        assert_eq!(c.apply(CheckAction::ReconcileVoid { on: day }), Err(CheckStateError::AlreadyReconciled(100_001)));
    }

    #[test]
    fn test_cleared_check_cannot_be_voided() {
        let day = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        let mut c = check();
        assert_eq!(c.apply(CheckAction::ReconcileVoid { on: day }), Err(CheckStateError::NotVoided(100_001)));
        c.apply(CheckAction::Clear { on: day, loaded: day }).unwrap();
        assert_eq!(c.apply(CheckAction::Void { on: day }), Err(CheckStateError::AlreadyCleared(100_001)));
    }
}
