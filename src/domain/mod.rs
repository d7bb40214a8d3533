//! Profit-sharing plan domain model.
//!
//! Plain data types and the pure rules that belong to them. Persistence
//! lives behind the traits in [`crate::interfaces`]; orchestration lives in
//! [`crate::services`].

pub mod actor;
pub mod audit;
pub mod check;
pub mod demographic;
pub mod distribution;
pub mod pay_profit;
pub mod profit_code;
pub mod profit_detail;
pub mod ssn;
pub mod tax_code;
pub mod transfer;
pub mod vesting;
pub mod workflow;
pub mod zero_contribution;

pub use actor::Actor;
pub use audit::{AuditEvent, AuditOperation};
pub use check::{CheckAction, CheckStateError, NewCheck, ProfitShareCheck};
pub use demographic::{Demographic, EmploymentDates, EmploymentStatus, HcmRecord, PersonName, SsnChangeRecord};
pub use distribution::{
    Distribution, DistributionFrequency, DistributionPayee, DistributionRequest, DistributionRequestReason,
    DistributionRequestStatus, DistributionRequestType, DistributionStatus, NewDistribution,
};
pub use pay_profit::{BeneficiaryType, EmployeeType, Enrollment, PayProfit};
pub use profit_code::ProfitCode;
pub use profit_detail::{round_cents, CodeTotals, LedgerBalance, PostingEntry, PostingKey, PostingKind, ProfitDetail};
pub use ssn::Ssn;
pub use tax_code::TaxCode;
pub use transfer::{payload_digest, FileTransferAudit, FtpOperationLog, FtpOperationType};
pub use vesting::{VestingSchedule, VestingStep};
pub use workflow::{
    CheckPayee, CheckRunStep, CheckRunWorkflow, PayeeLine, RunContext, StepStatus, Transition, TransitionError,
};
pub use zero_contribution::{ReasonEffect, ZeroContributionReason, ZeroContributionReasonTable};

/// Plan year a posting or run belongs to.
pub type ProfitYear = i16;
