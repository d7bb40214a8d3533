//! Plan services: ledger, vesting, check runs and their collaborators.

pub mod audit_trail;
pub mod check_issuance;
pub mod check_run;
pub mod demographics;
pub mod distribution;
pub mod file_transfer;
pub mod ledger;
pub mod vesting;
pub mod vesting_calculator;

pub use audit_trail::AuditTrail;
pub use check_issuance::{CheckIssuer, IssuanceError};
pub use check_run::{CheckRunError, CheckRunService};
pub use demographics::{DemographicDirectory, DirectoryError, HcmFeed};
pub use distribution::{DistributionError, DistributionProcessor, RequestSubmission};
pub use file_transfer::{
    FileTransferAuditor, FileTransferService, FilesystemTransport, PaymentFile, PaymentFileTransport, TransferError,
    TransferOutcome, TransportError,
};
pub use ledger::{LedgerError, ProfitLedger};
pub use vesting::{VestingError, VestingScheduleRegistry};
pub use vesting_calculator::{CalculationError, VestingBasis, VestingCalculator, VestingResult};
