//! Check-run workflow state machine.
//!
//! A run moves through six steps. Every change of state goes through
//! [`CheckRunWorkflow::apply`] with one of the three [`Transition`]s, so a
//! step can only move forward by one, move back to `ChecksNumbered` on a
//! reprint, or stop at `Failed`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Actor;
use super::ssn::Ssn;
use super::tax_code::TaxCode;
use super::ProfitYear;

pub const DEFAULT_MAX_REPRINT_COUNT: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStep {
    Created,
    BalancesCalculated,
    ChecksNumbered,
    Printed,
    Transferred,
    Confirmed,
}

impl CheckRunStep {
    pub const fn number(self) -> u8 {
        match self {
            Self::Created => 1,
            Self::BalancesCalculated => 2,
            Self::ChecksNumbered => 3,
            Self::Printed => 4,
            Self::Transferred => 5,
            Self::Confirmed => 6,
        }
    }

    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Created),
            2 => Some(Self::BalancesCalculated),
            3 => Some(Self::ChecksNumbered),
            4 => Some(Self::Printed),
            5 => Some(Self::Transferred),
            6 => Some(Self::Confirmed),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::BalancesCalculated => "balances_calculated",
            Self::ChecksNumbered => "checks_numbered",
            Self::Printed => "printed",
            Self::Transferred => "transferred",
            Self::Confirmed => "confirmed",
        }
    }

    pub const fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }
}

impl std::fmt::Display for CheckRunStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub const fn id(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Completed => 1,
            Self::Failed => 2,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::InProgress),
            1 => Some(Self::Completed),
            2 => Some(Self::Failed),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Allow comparing StepStatus with &str directly.
impl PartialEq<str> for StepStatus {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Advance,
    Reprint,
    Fail { reason: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Reprint => "reprint",
            Self::Fail { .. } => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("run is terminal at {step} ({status})")]
    Terminal { step: CheckRunStep, status: StepStatus },
    #[error("{transition} not allowed from {from}")]
    NotAllowed {
        from: CheckRunStep,
        transition: &'static str,
    },
    #[error("reprint count {count} has reached the maximum of {max}")]
    ReprintLimit { count: u32, max: u32 },
}

/// Identifies a run in error messages and log fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub step: CheckRunStep,
    pub reprint_count: u32,
}

impl std::fmt::Display for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run {} at step {} ({}), reprints {}",
            self.run_id,
            self.step.number(),
            self.step,
            self.reprint_count
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunWorkflow {
    pub id: Uuid,
    pub profit_year: ProfitYear,
    pub check_run_date: NaiveDate,
    pub step: CheckRunStep,
    pub status: StepStatus,
    /// First check number of the run's current block.
    pub check_number: Option<i64>,
    pub reprint_count: u32,
    pub max_reprint_count: u32,
    pub version: u32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

impl CheckRunWorkflow {
    pub fn new(profit_year: ProfitYear, check_run_date: NaiveDate, max_reprint_count: u32, actor: &Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            profit_year,
            check_run_date,
            step: CheckRunStep::Created,
            status: StepStatus::InProgress,
            check_number: None,
            reprint_count: 0,
            max_reprint_count,
            version: 0,
            failure_reason: None,
            created_at: Utc::now(),
            created_by: actor.user_name().to_string(),
            modified_at: None,
            modified_by: None,
        }
    }

    pub fn context(&self) -> RunContext {
        RunContext {
            run_id: self.id,
            step: self.step,
            reprint_count: self.reprint_count,
        }
    }

    /// Confirmed and failed runs accept no further writes.
    pub fn is_terminal(&self) -> bool {
        self.status != StepStatus::InProgress
    }

    pub fn can_reprint(&self) -> bool {
        self.reprint_count < self.max_reprint_count
    }

    /// Record the first number of a newly issued check block.
    pub fn record_check_block(&mut self, first: i64, actor: &Actor) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal {
                step: self.step,
                status: self.status,
            });
        }
        self.check_number = Some(first);
        self.touch(actor);
        Ok(())
    }

    /// Whether the run still needs a check block for its current step.
    pub fn awaiting_check_block(&self) -> bool {
        self.check_number.is_none()
    }

    fn touch(&mut self, actor: &Actor) {
        self.version += 1;
        self.modified_at = Some(Utc::now());
        self.modified_by = Some(actor.user_name().to_string());
    }

    /// Apply one transition and bump the optimistic version.
    pub fn apply(&mut self, transition: Transition, actor: &Actor) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal {
                step: self.step,
                status: self.status,
            });
        }

        match (&transition, self.step) {
            (Transition::Advance, step) => {
                let next = step.next().ok_or(TransitionError::NotAllowed {
                    from: step,
                    transition: transition.name(),
                })?;
                self.step = next;
                if next == CheckRunStep::Confirmed {
                    self.status = StepStatus::Completed;
                }
            }
            (Transition::Reprint, CheckRunStep::Printed | CheckRunStep::Transferred) => {
                if !self.can_reprint() {
                    return Err(TransitionError::ReprintLimit {
                        count: self.reprint_count,
                        max: self.max_reprint_count,
                    });
                }
                self.step = CheckRunStep::ChecksNumbered;
                self.reprint_count += 1;
                // The old block is void; a new one is recorded once issued.
                self.check_number = None;
            }
            (Transition::Reprint, step) => {
                return Err(TransitionError::NotAllowed {
                    from: step,
                    transition: transition.name(),
                });
            }
            (Transition::Fail { reason }, _) => {
                self.status = StepStatus::Failed;
                self.failure_reason = Some(reason.clone());
            }
        }

        self.touch(actor);
        Ok(())
    }
}

/// Payee line as submitted for balance calculation, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeLine {
    #[serde(default)]
    pub ssn: Option<Ssn>,
    pub demographic_id: i32,
    #[serde(default)]
    pub payable_name: String,
    pub amount: Decimal,
    pub tax_code: TaxCode,
    #[serde(default)]
    pub payment_sequence: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayeeDefect {
    #[error("payee {index} has no SSN")]
    MissingSsn { index: usize },
    #[error("payee {index} has no payable name")]
    MissingName { index: usize },
    #[error("payee {index} has negative amount {amount}")]
    NegativeAmount { index: usize, amount: Decimal },
    #[error("payee {index} amount {amount} has more than two fractional digits")]
    TooPrecise { index: usize, amount: Decimal },
}

impl PayeeLine {
    pub fn validate(self, index: usize) -> Result<CheckPayee, PayeeDefect> {
        let ssn = self.ssn.ok_or(PayeeDefect::MissingSsn { index })?;
        let payable_name = self.payable_name.trim().to_string();
        if payable_name.is_empty() {
            return Err(PayeeDefect::MissingName { index });
        }
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PayeeDefect::NegativeAmount {
                index,
                amount: self.amount,
            });
        }
        if self.amount.normalize().scale() > 2 {
            return Err(PayeeDefect::TooPrecise {
                index,
                amount: self.amount,
            });
        }
        Ok(CheckPayee {
            ssn,
            demographic_id: self.demographic_id,
            payable_name,
            amount: self.amount,
            tax_code: self.tax_code,
            payment_sequence: self.payment_sequence,
        })
    }
}

/// A finalized payee of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPayee {
    pub ssn: Ssn,
    pub demographic_id: i32,
    pub payable_name: String,
    pub amount: Decimal,
    pub tax_code: TaxCode,
    pub payment_sequence: Option<i32>,
}

impl From<CheckPayee> for PayeeLine {
    fn from(payee: CheckPayee) -> Self {
        Self {
            ssn: Some(payee.ssn),
            demographic_id: payee.demographic_id,
            payable_name: payee.payable_name,
            amount: payee.amount,
            tax_code: payee.tax_code,
            payment_sequence: payee.payment_sequence,
        }
    }
}
